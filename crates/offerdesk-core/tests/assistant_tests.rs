mod common;

use common::{create_test_assistant, ScriptedOracle};
use offerdesk_core::{
    assistant::CompiledQuery, Answer, Ask, Chat, DeskError, Explain, MonthWindow, YearWindow,
};
use serde_json::json;

fn ask(message: &str) -> Ask {
    Ask {
        message: message.to_string(),
        debug: false,
    }
}

fn chat(message: &str) -> Chat {
    Chat {
        message: message.to_string(),
    }
}

#[tokio::test]
async fn test_count_for_civil_month() {
    let oracle = ScriptedOracle::new(r#"{"kind":"count","timeRange":{"year":2025,"month":7}}"#);
    let (_dir, assistant, store) = create_test_assistant(oracle.clone());

    let reply = assistant
        .ask(&ask("How many students got placed in July 2025?"))
        .await
        .unwrap();

    // 2025-06-30T18:30Z is July 1st in IST, 2025-07-31T18:30Z is August 1st.
    assert_eq!(reply.answer, Answer::text("2"));
    assert!(reply.debug.is_none());
    assert_eq!(store.calls(), 1);
    assert_eq!(
        oracle.messages.lock().unwrap().as_slice(),
        ["How many students got placed in July 2025?"]
    );
}

#[tokio::test]
async fn test_debug_reply_carries_plan_and_match() {
    let raw = r#"{"kind":"count","timeRange":{"year":2025,"month":7}}"#;
    let (_dir, assistant, _store) = create_test_assistant(ScriptedOracle::new(raw));

    let reply = assistant
        .ask(&Ask {
            message: "How many placements in July 2025?".to_string(),
            debug: true,
        })
        .await
        .unwrap();

    let debug = reply.debug.expect("debug info requested");
    assert_eq!(debug.raw, raw);
    assert_eq!(debug.plan["kind"], "count");
    assert!(debug.filter.is_some());
    assert!(debug.pipeline.is_none());
}

#[tokio::test]
async fn test_ranking_question_overrides_count_plan() {
    let (_dir, assistant, _store) =
        create_test_assistant(ScriptedOracle::new(r#"{"kind":"count"}"#));

    let reply = assistant
        .ask(&ask("Which month had the most placements in 2025?"))
        .await
        .unwrap();

    let Answer::Text { text, data } = reply.answer else {
        panic!("expected a text answer");
    };
    assert_eq!(text, "Most placements in July 2025: 2 students.");
    assert_eq!(data.map(|rows| rows.len()), Some(1));
}

#[tokio::test]
async fn test_top_company_text() {
    let (_dir, assistant, _store) =
        create_test_assistant(ScriptedOracle::new(r#"{"kind":"count"}"#));

    let reply = assistant
        .ask(&ask("Which company hired the most students?"))
        .await
        .unwrap();

    let Answer::Text { text, .. } = reply.answer else {
        panic!("expected a text answer");
    };
    assert_eq!(text, "Most placements by Acme: 2 students.");
}

#[tokio::test]
async fn test_dues_question_adds_fee_filter() {
    let (_dir, assistant, _store) =
        create_test_assistant(ScriptedOracle::new(r#"{"kind":"count"}"#));

    let reply = assistant
        .ask(&ask("How many students still have dues?"))
        .await
        .unwrap();

    assert_eq!(reply.answer, Answer::text("2"));
}

#[tokio::test]
async fn test_list_defaults() {
    let plan = r#"{"kind":"list","timeRange":{"year":2025,"month":7}}"#;
    let (_dir, assistant, _store) = create_test_assistant(ScriptedOracle::new(plan));

    let reply = assistant
        .ask(&ask("List students placed in July 2025"))
        .await
        .unwrap();

    let Answer::List { rows } = reply.answer else {
        panic!("expected a list answer");
    };
    let names: Vec<_> = rows.iter().map(|row| row["studentName"].clone()).collect();
    assert_eq!(names, vec![json!("Asha Rao"), json!("Ravi Kumar")]);
    assert!(rows[0].get("remainingFee").is_none());
}

#[tokio::test]
async fn test_invalid_model_output_keeps_raw_text() {
    let (_dir, assistant, store) =
        create_test_assistant(ScriptedOracle::new("Sure! Here is your plan."));

    let err = assistant
        .ask(&ask("How many placements?"))
        .await
        .unwrap_err();

    assert!(matches!(err, DeskError::UpstreamPlanInvalid { .. }));
    assert_eq!(err.raw(), Some("Sure! Here is your plan."));
    assert_eq!(err.status_code(), 400);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_unknown_group_field_is_rejected() {
    let plan = r#"{"kind":"aggregate","groupBy":["salary"],"metrics":[{"op":"count"}]}"#;
    let (_dir, assistant, store) = create_test_assistant(ScriptedOracle::new(plan));

    let err = assistant
        .ask(&ask("Break down offers by salary"))
        .await
        .unwrap_err();

    match err {
        DeskError::UnknownField { path, field } => {
            assert_eq!(path, "groupBy[0]");
            assert_eq!(field, "salary");
        }
        other => panic!("expected UnknownField, got {other:?}"),
    }
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_empty_message_never_reaches_oracle() {
    let oracle = ScriptedOracle::new(r#"{"kind":"count"}"#);
    let (_dir, assistant, _store) = create_test_assistant(oracle.clone());

    let err = assistant.ask(&ask("   ")).await.unwrap_err();

    assert!(matches!(err, DeskError::InvalidRequest { .. }));
    assert!(oracle.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_write_stage_rejected_before_store() {
    let (_dir, assistant, store) = create_test_assistant(ScriptedOracle::new("{}"));

    let err = assistant
        .run_pipeline(&json!([{"$match": {}}, {"$out": "copy"}]))
        .await
        .unwrap_err();

    assert!(matches!(err, DeskError::UnsafePipeline { ref stage } if stage == "$out"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_operator_pipeline_runs() {
    let (_dir, assistant, _store) = create_test_assistant(ScriptedOracle::new("{}"));

    let rows = assistant
        .run_pipeline(&json!([
            {"$group": {"_id": "$location", "n": {"$sum": 1}}},
            {"$sort": {"n": -1}},
            {"$limit": 1}
        ]))
        .await
        .unwrap();

    assert_eq!(rows, vec![json!({"_id": "Pune", "n": 2})]);
}

#[tokio::test]
async fn test_grouped_count_reports_count_per_group() {
    let oracle = ScriptedOracle::new(
        r#"{"kind":"count","groupBy":["location"],"sort":[{"by":"count","dir":"desc"}]}"#,
    );
    let (_dir, assistant, _store) = create_test_assistant(oracle);

    let reply = assistant
        .ask(&ask("How many offers per location?"))
        .await
        .unwrap();

    let Answer::List { rows } = reply.answer else {
        panic!("expected a list answer");
    };
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], json!({"location": "Pune", "count": 2}));
    assert!(rows.contains(&json!({"location": "Mumbai", "count": 1})));
    assert!(rows.contains(&json!({"location": "Bengaluru", "count": 1})));
}

#[tokio::test]
async fn test_explain_shows_implicit_count_metric() {
    let (_dir, assistant, store) = create_test_assistant(ScriptedOracle::new("{}"));

    let explanation = assistant
        .explain(&Explain {
            plan: r#"{"kind":"count","groupBy":["companyName"]}"#.to_string(),
            message: None,
        })
        .unwrap();

    assert_eq!(explanation.plan.metrics.len(), 1);
    let CompiledQuery::Aggregate(pipeline) = explanation.query else {
        panic!("expected an aggregation");
    };
    let documents = pipeline.to_documents();
    let group = documents
        .iter()
        .find_map(|stage| stage.get("$group"))
        .expect("group stage");
    assert_eq!(group["count"], json!({"$sum": 1}));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_explain_reports_ranking_override() {
    let (_dir, assistant, store) = create_test_assistant(ScriptedOracle::new("{}"));

    let explanation = assistant
        .explain(&Explain {
            plan: r#"{"kind":"count"}"#.to_string(),
            message: Some("which month had the most placements".to_string()),
        })
        .unwrap();

    assert!(explanation.ranking_override);
    assert!(matches!(explanation.query, CompiledQuery::Aggregate(_)));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_intent_count_uses_message_month() {
    let oracle = ScriptedOracle::new(r#"{"intent":"COUNT_PLACEMENTS"}"#);
    let (_dir, assistant, _store) = create_test_assistant(oracle);

    let reply = assistant
        .chat(&chat("How many students got placed in July 2025?"))
        .await
        .unwrap();

    assert_eq!(reply.answer, Answer::text("Students placed in July 2025: 2."));
}

#[tokio::test]
async fn test_intent_chart_by_student() {
    let plan = r#"{"intent":"CHART_PLACEMENTS_BY_STUDENT","time":{"year":2025,"month":7}}"#;
    let (_dir, assistant, _store) = create_test_assistant(ScriptedOracle::new(plan));

    let reply = assistant.chat(&chat("chart july placements")).await.unwrap();

    let Answer::Chart {
        chart,
        data,
        summary,
        unit,
    } = reply.answer
    else {
        panic!("expected a chart answer");
    };
    assert_eq!(chart.x_key, "studentName");
    assert_eq!(
        data,
        vec![
            json!({"studentName": "Asha Rao", "packageLPA": 6.5}),
            json!({"studentName": "Ravi Kumar", "packageLPA": 9.5}),
        ]
    );
    assert_eq!(summary.as_deref(), Some("2 students placed in July 2025."));
    assert_eq!(unit.as_deref(), Some("LPA"));
}

#[tokio::test]
async fn test_intent_monthly_trend() {
    let plan = r#"{"intent":"CHART_MONTHLY_TREND","time":{"year":2025}}"#;
    let (_dir, assistant, _store) = create_test_assistant(ScriptedOracle::new(plan));

    let reply = assistant.chat(&chat("monthly trend")).await.unwrap();

    let Answer::Chart { data, summary, .. } = reply.answer else {
        panic!("expected a chart answer");
    };
    assert_eq!(
        data,
        vec![
            json!({"month": "June", "count": 1}),
            json!({"month": "July", "count": 2}),
            json!({"month": "August", "count": 1}),
        ]
    );
    assert_eq!(summary.as_deref(), Some("Monthly placement trend for 2025."));
}

#[tokio::test]
async fn test_invalid_intent_is_upstream_error() {
    let (_dir, assistant, _store) =
        create_test_assistant(ScriptedOracle::new(r#"{"intent":"DELETE_EVERYTHING"}"#));

    let err = assistant.chat(&chat("do it")).await.unwrap_err();

    assert_eq!(err.to_string(), "Model did not return a valid plan");
    assert_eq!(err.raw(), Some(r#"{"intent":"DELETE_EVERYTHING"}"#));
}

#[tokio::test]
async fn test_month_and_year_reports() {
    let (_dir, assistant, _store) = create_test_assistant(ScriptedOracle::new("{}"));

    let month = assistant
        .month_report(&MonthWindow {
            year: 2025,
            month: 7,
        })
        .await
        .unwrap();
    assert_eq!(month.count, 2);
    assert_eq!(month.sample[0]["studentName"], "Asha Rao");

    let year = assistant
        .year_report(&YearWindow { year: Some(2025) })
        .await
        .unwrap();
    assert_eq!(year.total(), 4);
    assert_eq!(year.months.len(), 3);

    let err = assistant
        .month_report(&MonthWindow {
            year: 2025,
            month: 13,
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}
