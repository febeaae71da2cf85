//! Prompt templates for MCP server

use std::sync::LazyLock;

use rmcp::model::{Prompt, PromptArgument};
use serde_json::{Map, Value};

/// Argument definition for a prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplateArg {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Definition of a prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub description: String,
    pub template: String,
    pub arguments: Vec<PromptTemplateArg>,
}

impl PromptTemplate {
    /// The template as listed to clients.
    pub fn to_prompt(&self) -> Prompt {
        let arguments = self
            .arguments
            .iter()
            .map(|arg| PromptArgument {
                name: arg.name.clone(),
                title: None,
                description: Some(arg.description.clone()),
                required: Some(arg.required),
            })
            .collect();
        Prompt::new(&self.name, Some(&self.description), Some(arguments))
    }

    /// Substitutes `{name}` placeholders. Strings and numbers are accepted;
    /// the error names the offending argument.
    pub fn render(&self, args: Option<&Map<String, Value>>) -> Result<String, String> {
        let mut text = self.template.clone();
        for arg in &self.arguments {
            let value = match args.and_then(|args| args.get(&arg.name)) {
                Some(Value::String(value)) => value.clone(),
                Some(value @ Value::Number(_)) => value.to_string(),
                Some(_) => return Err(format!("Argument '{}' must be a string", arg.name)),
                None if arg.required => {
                    return Err(format!("Required argument '{}' is missing", arg.name))
                }
                None => continue,
            };
            text = text.replace(&format!("{{{}}}", arg.name), &value);
        }
        Ok(text)
    }

    pub fn find(name: &str) -> Option<&'static PromptTemplate> {
        PROMPT_TEMPLATES.iter().find(|template| template.name == name)
    }
}

pub static PROMPT_TEMPLATES: LazyLock<Vec<PromptTemplate>> = LazyLock::new(get_prompt_templates);

/// Predefined prompt templates for placement questions
pub fn get_prompt_templates() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate {
            name: "placement_question".to_string(),
            description: "Answer a question about placement offers with Offerdesk's tools"
                .to_string(),
            template: r#"You are **Offerdesk Analyst**, answering questions about student placement offers.

# Question
{question}

# How to Answer
1. Call `ask` with the question as `message`. Set `debug` to true if you need to see the plan that was executed.
2. If the answer is a list or chart, summarise the rows in one or two sentences before showing them.
3. If `ask` fails with an invalid plan, call `explain` with a corrected plan to check it compiles, then retry.
4. For simple counts, lists and charts by month, `chat` is an alternative that uses a fixed set of intents.

# Rules
- Months are calendar months in India Standard Time (+05:30).
- Only these fields exist: studentName, offerDate, joiningDate, companyName, location, packageLPA, totalPostPlacementFee, remainingFee.
- Never invent numbers; report what the tools return."#
                .to_string(),
            arguments: vec![PromptTemplateArg {
                name: "question".to_string(),
                description: "The question about placements".to_string(),
                required: true,
            }],
        },
        PromptTemplate {
            name: "monthly_review".to_string(),
            description: "Review placement activity month by month for a year".to_string(),
            template: r#"Review placement activity for {year}.

1. Call `year_report` with `year` = {year} to get offers per month.
2. For the busiest month, call `month_report` to see the first offers.
3. Call `ask` with "Which company hired the most students in {year}?".
4. Write a short review: total offers, the busiest month, the top company, and any month with no offers."#
                .to_string(),
            arguments: vec![PromptTemplateArg {
                name: "year".to_string(),
                description: "Calendar year, e.g. 2025".to_string(),
                required: true,
            }],
        },
    ]
}
