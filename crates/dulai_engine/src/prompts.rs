use dulai_core::ReportType;

pub const DEFAULT_LANGUAGE: &str = "english";

/// Prompt that turns gathered research into the requested report.
pub fn report_prompt(report_type: ReportType, question: &str, research: &str, language: &str) -> String {
    let body = match report_type {
        ReportType::Resource => format!(
            "\"\"\"{research}\"\"\" Based on the above information, generate a bibliography \
recommendation report for the following question or topic: \"{question}\". The report should \
provide a detailed analysis of each recommended resource, explaining how each source can \
contribute to finding answers to the research question. Focus on the relevance, reliability, \
and significance of each source. Ensure that the report is well-structured, informative, \
in-depth, and follows Markdown syntax. Include relevant facts, figures, and numbers whenever \
available. The report should have a minimum length of 1,200 words."
        ),
        ReportType::Outline => format!(
            "\"\"\"{research}\"\"\" Using the above information, generate an outline for a research \
report in Markdown syntax for the following question or topic: \"{question}\". The outline \
should provide a well-structured framework for the research report, including the main \
sections, subsections, and key points to be covered. The research report should be detailed, \
informative, in-depth, and a minimum of 1,200 words. Use appropriate Markdown syntax to format \
the outline and ensure readability."
        ),
        ReportType::Research | ReportType::WebBrowse => format!(
            "\"\"\"{research}\"\"\" Using the above information, answer the following question or \
topic: \"{question}\" in a detailed report -- The report should focus on the answer to the \
question, should be well structured, informative, in depth, with facts and numbers if \
available, a minimum of 1,200 words and with markdown syntax and apa format. You MUST determine \
your own concrete and valid opinion based on the given information. Do NOT defer to general \
and meaningless conclusions. Write all used source urls at the end of the report in apa format."
        ),
    };
    format!("{body} Write the report in {language}.")
}

/// Asks the model for candidate sources when the task names none.
pub fn source_plan_prompt(query: &str, max_sources: usize) -> String {
    format!(
        "List up to {max_sources} publicly reachable web page URLs that are the most relevant \
sources for researching the following task: \"{query}\". Respond with a JSON array of URL \
strings only, for example [\"https://example.com/page\"]."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_prompt_carries_question_research_and_language() {
        let prompt = report_prompt(ReportType::Outline, "Why?", "notes", "german");
        assert!(prompt.starts_with("\"\"\"notes\"\"\""));
        assert!(prompt.contains("\"Why?\""));
        assert!(prompt.contains("outline"));
        assert!(prompt.ends_with("Write the report in german."));
    }
}
