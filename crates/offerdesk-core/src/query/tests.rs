#[cfg(test)]
mod query_tests {
    use serde_json::{json, Value};

    use crate::{
        error::DeskError,
        plan::{validate_legacy, validate_universal, UniversalPlan},
        query::{
            build_legacy_filter, compile_aggregation, compile_filter, Pipeline, Stage, MAX_LIMIT,
        },
    };

    fn plan(value: Value) -> UniversalPlan {
        validate_universal(&value).unwrap()
    }

    fn operators(pipeline: &Pipeline) -> Vec<&'static str> {
        pipeline.stages.iter().map(Stage::operator).collect()
    }

    #[test]
    fn test_range_conditions_on_one_field_merge() {
        let filter = compile_filter(&plan(json!({
            "filters": [
                {"field": "packageLPA", "op": ">", "value": 5},
                {"field": "packageLPA", "op": "<=", "value": 10}
            ]
        })))
        .unwrap();
        assert_eq!(filter.len(), 1);
        assert_eq!(
            filter.to_document(),
            json!({"packageLPA": {"$gt": 5, "$lte": 10}})
        );
    }

    #[test]
    fn test_operator_table() {
        let filter = compile_filter(&plan(json!({
            "filters": [
                {"field": "companyName", "op": "contains", "value": "Acme (India)"},
                {"field": "location", "op": "in", "value": "Pune"},
                {"field": "studentName", "op": "!=", "value": "Test"},
                {"field": "totalPostPlacementFee", "op": "between", "start": 1000},
                {"field": "joiningDate", "op": "exists"},
                {"field": "remainingFee", "op": "=", "value": 0}
            ]
        })))
        .unwrap();
        assert_eq!(
            filter.to_document(),
            json!({
                "companyName": {"$regex": "Acme \\(India\\)", "$options": "i"},
                "location": {"$in": ["Pune"]},
                "studentName": {"$ne": "Test"},
                "totalPostPlacementFee": {"$gte": 1000},
                "joiningDate": {"$ne": null},
                "remainingFee": 0
            })
        );
    }

    #[test]
    fn test_equality_replaces_earlier_range() {
        let filter = compile_filter(&plan(json!({
            "filters": [
                {"field": "packageLPA", "op": ">", "value": 5},
                {"field": "packageLPA", "op": "=", "value": 7}
            ]
        })))
        .unwrap();
        assert_eq!(filter.to_document(), json!({"packageLPA": 7}));
    }

    #[test]
    fn test_time_range_month_window() {
        let filter = compile_filter(&plan(json!({
            "kind": "count",
            "timeRange": {"field": "offerDate", "year": 2025, "month": 7},
            "filters": [{"field": "offerDate", "op": "exists"}]
        })))
        .unwrap();
        assert_eq!(
            filter.to_document(),
            json!({"offerDate": {
                "$gte": {"$date": "2025-06-30T18:30:00Z"},
                "$lt": {"$date": "2025-07-31T18:30:00Z"}
            }})
        );
    }

    #[test]
    fn test_time_range_overrides_filter_on_same_field() {
        let filter = compile_filter(&plan(json!({
            "filters": [
                {"field": "offerDate", "op": ">", "value": "2020-01-01"},
                {"field": "companyName", "op": "=", "value": "Acme"}
            ],
            "timeRange": {"year": 2025}
        })))
        .unwrap();
        assert_eq!(
            filter.to_document(),
            json!({
                "offerDate": {
                    "$gte": {"$date": "2024-12-31T18:30:00Z"},
                    "$lt": {"$date": "2025-12-31T18:30:00Z"}
                },
                "companyName": "Acme"
            })
        );
    }

    #[test]
    fn test_time_range_literal_bounds() {
        let filter = compile_filter(&plan(json!({
            "timeRange": {"field": "joiningDate", "start": "2025-01-01"}
        })))
        .unwrap();
        assert_eq!(
            filter.to_document(),
            json!({"joiningDate": {"$gte": {"$date": "2025-01-01T00:00:00Z"}}})
        );

        // A month without a year and no bounds adds nothing.
        let filter = compile_filter(&plan(json!({"timeRange": {"month": 3}}))).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_aggregation_stage_order_and_shape() {
        let pipeline = compile_aggregation(&plan(json!({
            "kind": "aggregate",
            "filters": [{"field": "offerDate", "op": "exists"}],
            "groupBy": ["companyName", {"timeBucket": {"field": "offerDate", "unit": "month"}}],
            "metrics": [{"op": "count", "as": "count"}, {"op": "avg", "field": "packageLPA"}],
            "sort": [{"by": "count", "dir": "desc"}, {"by": "companyName", "dir": "asc"}],
            "limit": 5
        })))
        .unwrap();

        assert_eq!(
            operators(&pipeline),
            vec!["$match", "$addFields", "$group", "$project", "$sort", "$limit"]
        );
        assert_eq!(
            pipeline.to_documents(),
            vec![
                json!({"$match": {"offerDate": {"$ne": null}}}),
                json!({"$addFields": {"__tb1": {"$dateTrunc": {
                    "date": "$offerDate", "unit": "month", "timezone": "Asia/Kolkata"
                }}}}),
                json!({"$group": {
                    "_id": {"companyName": "$companyName", "offerDate_month": "$__tb1"},
                    "count": {"$sum": 1},
                    "avg_packageLPA": {"$avg": "$packageLPA"}
                }}),
                json!({"$project": {
                    "_id": 0,
                    "companyName": "$_id.companyName",
                    "offerDate_month": "$_id.offerDate_month",
                    "count": 1,
                    "avg_packageLPA": 1
                }}),
                json!({"$sort": {"count": -1, "companyName": 1}}),
                json!({"$limit": 5}),
            ]
        );
    }

    #[test]
    fn test_time_buckets_truncate_in_civil_zone() {
        let pipeline = compile_aggregation(&plan(json!({
            "kind": "aggregate",
            "timeRange": {"year": 2025, "timezone": "UTC"},
            "groupBy": [{"timeBucket": {"field": "offerDate", "unit": "week"}}],
            "metrics": [{"op": "count"}]
        })))
        .unwrap();
        assert_eq!(
            pipeline.to_documents()[1],
            json!({"$addFields": {"__tb0": {"$dateTrunc": {
                "date": "$offerDate", "unit": "week", "timezone": "Asia/Kolkata"
            }}}})
        );
    }

    #[test]
    fn test_metrics_without_group_use_null_key() {
        let pipeline = compile_aggregation(&plan(json!({
            "kind": "aggregate",
            "metrics": [{"op": "sum", "field": "remainingFee"}]
        })))
        .unwrap();
        assert_eq!(operators(&pipeline), vec!["$group", "$project"]);
        assert_eq!(
            pipeline.stages[0].to_document(),
            json!({"$group": {"_id": null, "sum_remainingFee": {"$sum": "$remainingFee"}}})
        );
    }

    #[test]
    fn test_limit_is_clamped() {
        let mut plan = plan(json!({"kind": "aggregate", "groupBy": ["location"]}));
        plan.limit = Some(500);
        let pipeline = compile_aggregation(&plan).unwrap();
        assert_eq!(pipeline.stages.last(), Some(&Stage::Limit(MAX_LIMIT)));
        assert_eq!(MAX_LIMIT, 200);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let plan = plan(json!({
            "kind": "chart",
            "timeRange": {"year": 2025},
            "groupBy": [{"timeBucket": {"field": "offerDate", "unit": "week"}}],
            "metrics": [{"op": "count"}],
            "sort": [{"by": "offerDate_week", "dir": "asc"}]
        }));
        let first =
            serde_json::to_string(&compile_aggregation(&plan).unwrap().to_documents()).unwrap();
        for _ in 0..5 {
            let again =
                serde_json::to_string(&compile_aggregation(&plan).unwrap().to_documents()).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_compiled_pipeline_parses_back() {
        let compiled = compile_aggregation(&plan(json!({
            "kind": "aggregate",
            "timeRange": {"year": 2025, "month": 2},
            "groupBy": ["location", {"timeBucket": {"field": "offerDate", "unit": "day"}}],
            "metrics": [{"op": "max", "field": "packageLPA", "as": "best"}],
            "sort": [{"by": "best"}],
            "limit": 3
        })))
        .unwrap();
        let parsed = Pipeline::parse(&json!(compiled.to_documents())).unwrap();
        assert_eq!(parsed, compiled);
    }

    #[test]
    fn test_write_stages_fail_read_only_gate() {
        let pipeline = Pipeline::parse(&json!([
            {"$match": {"companyName": "Acme"}},
            {"$out": "stolen"}
        ]))
        .unwrap();
        match pipeline.ensure_read_only() {
            Err(DeskError::UnsafePipeline { stage }) => assert_eq!(stage, "$out"),
            other => panic!("unexpected result: {other:?}"),
        }

        let merge = Pipeline::parse(&json!([{"$merge": {"into": "x"}}])).unwrap();
        assert!(merge.ensure_read_only().is_err());

        let compiled = compile_aggregation(&plan(json!({"groupBy": ["location"]}))).unwrap();
        assert!(compiled.ensure_read_only().is_ok());
    }

    #[test]
    fn test_code_operators_are_rejected_at_parse() {
        let err = Pipeline::parse(&json!([
            {"$group": {"_id": null, "x": {"$accumulator": {"init": "function() {}"}}}}
        ]))
        .unwrap_err();
        assert!(matches!(err, DeskError::UnsafePipeline { ref stage } if stage == "$accumulator"));

        let err = Pipeline::parse(&json!([{"$match": {"$where": "sleep(1000)"}}])).unwrap_err();
        assert!(matches!(err, DeskError::UnsafePipeline { ref stage } if stage == "$where"));

        let err = Pipeline::parse(&json!([
            {"$addFields": {"x": {"$function": {"body": "return 1", "args": [], "lang": "js"}}}}
        ]))
        .unwrap_err();
        assert!(matches!(err, DeskError::UnsafePipeline { ref stage } if stage == "$function"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let err = Pipeline::parse(&json!([{"$lookup": {"from": "users"}}])).unwrap_err();
        assert!(matches!(err, DeskError::InvalidInput { .. }));
    }

    #[test]
    fn test_legacy_filter() {
        let plan = validate_legacy(&json!({
            "intent": "COUNT_PLACEMENTS",
            "time": {"year": 2025, "month": 12},
            "filters": {"company": "acme", "location": "Pune"}
        }))
        .unwrap();
        assert_eq!(
            build_legacy_filter(&plan).unwrap().to_document(),
            json!({
                "companyName": {"$regex": "acme", "$options": "i"},
                "location": {"$regex": "Pune", "$options": "i"},
                "offerDate": {
                    "$gte": {"$date": "2025-11-30T18:30:00Z"},
                    "$lt": {"$date": "2025-12-31T18:30:00Z"}
                }
            })
        );

        let bare = validate_legacy(&json!({"intent": "LIST_PLACEMENTS"})).unwrap();
        assert_eq!(
            build_legacy_filter(&bare).unwrap().to_document(),
            json!({"offerDate": {"$ne": null}})
        );
    }
}
