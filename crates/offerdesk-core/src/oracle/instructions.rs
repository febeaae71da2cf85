//! System instructions sent with every question.

use std::fmt;

use crate::{
    catalog::FieldCatalog,
    plan::{ChartKind, FilterOp, Intent, MetricOp, PlanKind, TimeUnit},
};

const UNIVERSAL_EXAMPLES: &str = r#"Examples:
Q: "How many total students do we have?"
-> {"kind":"count"}

Q: "How many students got placed in July 2025?"
-> {"kind":"count","timeRange":{"field":"offerDate","year":2025,"month":7},"filters":[{"field":"offerDate","op":"exists"}]}

Q: "How many students have remaining fees?"
-> {"kind":"count","filters":[{"field":"remainingFee","op":">","value":0}]}

Q: "How many students are paid in full?"
-> {"kind":"count","filters":[{"field":"remainingFee","op":"<=","value":0}]}

Q: "In which month did most students get placed in 2025?"
-> {"kind":"aggregate","timeRange":{"field":"offerDate","year":2025},"filters":[{"field":"offerDate","op":"exists"}],"groupBy":[{"timeBucket":{"field":"offerDate","unit":"month"}}],"metrics":[{"op":"count","as":"count"}],"sort":[{"by":"count","dir":"desc"}],"limit":1}

Q: "Top 5 companies by placements in 2025"
-> {"kind":"aggregate","timeRange":{"field":"offerDate","year":2025},"filters":[{"field":"offerDate","op":"exists"}],"groupBy":["companyName"],"metrics":[{"op":"count","as":"count"}],"sort":[{"by":"count","dir":"desc"}],"limit":5}

Q: "Bar chart of placements by location in July 2025"
-> {"kind":"chart","timeRange":{"field":"offerDate","year":2025,"month":7},"filters":[{"field":"offerDate","op":"exists"}],"groupBy":["location"],"metrics":[{"op":"count","as":"count"}],"chart":{"kind":"bar","x":"location","y":["count"]}}
"#;

fn join(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Instructions for the general plan grammar, embedding the field catalog.
pub struct UniversalInstructions<'a>(pub &'a FieldCatalog);

impl fmt::Display for UniversalInstructions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let catalog = self.0;
        writeln!(
            f,
            "You convert natural language questions about the collection \"{}\" into a strict JSON \"UniversalPlan\" that the server compiles into a query.",
            catalog.collection
        )?;
        writeln!(f, "\nFields (canonical -> synonyms):")?;
        for field in &catalog.fields {
            writeln!(
                f,
                "- {} ({}): {}",
                field.name,
                field.field_type,
                field.synonyms.join(", ")
            )?;
        }

        writeln!(f, "\nGrammar:")?;
        writeln!(f, "- kind: one of {}", join(PlanKind::NAMES))?;
        writeln!(
            f,
            "- filters: [{{field, op, value?, start?, end?}}] with op one of {}",
            join(FilterOp::NAMES)
        )?;
        writeln!(
            f,
            "- timeRange: {{field, year?, month? (1-12), start?, end?, timezone?}}; timezone defaults to \"{}\"",
            catalog.timezone
        )?;
        writeln!(
            f,
            "- groupBy: field names or {{\"timeBucket\": {{field, unit}}}} with unit one of {}",
            join(TimeUnit::NAMES)
        )?;
        writeln!(
            f,
            "- metrics: [{{op, field?, as?}}] with op one of {}; field is required unless op is \"count\"",
            join(MetricOp::NAMES)
        )?;
        writeln!(
            f,
            "- sort: [{{by, dir: \"asc\"|\"desc\"}}]; limit: 1-200; projection: [field]"
        )?;
        writeln!(
            f,
            "- chart: {{kind, x, y: [..]}} with kind one of {}",
            join(ChartKind::NAMES)
        )?;

        f.write_str(
            "\nRules:\n\
             - Map user words to canonical field names via synonyms only.\n\
             - Time windows like \"in July 2025\" -> timeRange: {\"field\":\"offerDate\",\"year\":2025,\"month\":7}.\n\
             - Numeric answer -> kind \"count\".\n\
             - \"which X has most Y\" (month/company/location with placements) -> kind \"aggregate\", groupBy the dimension, metrics [{\"op\":\"count\",\"as\":\"count\"}], sort by count desc, limit 1.\n\
             - Charts -> kind \"chart\" with chart {kind, x, y}.\n\
             - Lists -> kind \"list\" with projection.\n\
             - Use only canonical fields in filters, groupBy, metrics, sort and projection.\n\
             - Return ONLY JSON that matches the grammar. No prose, no code fences.\n\n",
        )?;
        f.write_str(UNIVERSAL_EXAMPLES)
    }
}

pub fn universal_instructions(catalog: &FieldCatalog) -> String {
    UniversalInstructions(catalog).to_string()
}

/// Instructions for the intent-based grammar.
pub fn legacy_instructions() -> String {
    format!(
        "You are a data query planner for the placement offers collection.\n\
         Each document has: studentName, offerDate (date), joiningDate (date), companyName, location, \
         hr {{name, contactNumber, email}}, packageLPA (number), totalPostPlacementFee (number), \
         remainingPrePlacementFee (number), discount (number), installments [{{label, amount}}], \
         remainingFee (number), remainingFeeNote (string).\n\n\
         Respond with an object {{intent, time?, filters?, chart?}}:\n\
         - intent: one of {intents}\n\
         - time: {{year, month (1-12)}}\n\
         - filters: {{company?, location?}} matched as case-insensitive substrings\n\
         - chart: {{kind: {charts}, xKey, yKeys: [..]}}\n\n\
         Mapping rules:\n\
         - \"placed\" means documents whose offerDate is set and falls in the requested time window.\n\
         - \"in July 2025\" means time.year=2025, time.month=7.\n\
         - \"package\" refers to packageLPA.\n\
         - For \"bar graph of students placed in <month> <year> and their package\": \
         intent=CHART_PLACEMENTS_BY_STUDENT, chart={{\"kind\":\"bar\",\"xKey\":\"studentName\",\"yKeys\":[\"packageLPA\"]}}\n\n\
         Return ONLY strict JSON (no prose, no code fences).\n",
        intents = join(Intent::NAMES),
        charts = ChartKind::NAMES.join("|"),
    )
}
