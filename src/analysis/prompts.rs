//! Prompt text sent to the analysis engine.

/// Shared system instruction for both request kinds.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful data visualization assistant. You only output valid JSON.";

/// Reply shown to the user when a chat turn cannot be completed.
pub const FALLBACK_REPLY: &str = "I'm sorry, I encountered an error analyzing your request.";

/// Number of charts the initial analysis asks for.
pub const SUGGESTED_CHARTS: usize = 4;

pub fn initial_analysis_prompt(columns: &[String], sample: &str, sample_rows: usize) -> String {
    format!(
        "You are an expert data analyst.\n\
         The dataset has these columns: {columns}.\n\
         The first {sample_rows} rows in CSV format:\n\
         \n\
         {sample}\n\
         \n\
         Analyze the structure of this data and:\n\
         1. Give the dataset a title.\n\
         2. Write a short summary of what the data most likely represents.\n\
         3. Propose {SUGGESTED_CHARTS} distinct, insightful charts for its key trends or distributions.\n\
         \x20  - xAxisKey and yAxisKey must be column names from the list above.\n\
         \x20  - Pick fitting chart types: bar for comparisons, line for trends, pie for distribution, scatter for correlation.",
        columns = columns.join(", "),
    )
}

pub fn chat_prompt(columns: &[String], sample: &str, user_message: &str) -> String {
    format!(
        "You are a data analyst.\n\
         The dataset has these columns: {columns}.\n\
         Sample rows:\n\
         {sample}\n\
         \n\
         User question: \"{user_message}\"\n\
         \n\
         Answer from the structure of the data. Exact aggregates over the full dataset are not \
         available to you, so explain how the data would show the answer, infer it from the sample \
         when it is obvious, or suggest a chart.\n\
         \n\
         If the user asks to \"show\", \"visualize\", \"plot\" or \"graph\" something, include a \
         newChart configuration in the JSON response. Otherwise provide only textResponse.",
        columns = columns.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["Month".to_string(), "Revenue".to_string()]
    }

    #[test]
    fn test_initial_prompt_embeds_columns_and_sample() {
        let prompt = initial_analysis_prompt(&columns(), "Month,Revenue\nJan,100", 30);
        assert!(prompt.contains("Month, Revenue"));
        assert!(prompt.contains("Month,Revenue\nJan,100"));
        assert!(prompt.contains("first 30 rows"));
        assert!(prompt.contains("4 distinct"));
    }

    #[test]
    fn test_chat_prompt_quotes_user_message() {
        let prompt = chat_prompt(&columns(), "Month,Revenue", "plot revenue by month");
        assert!(prompt.contains("User question: \"plot revenue by month\""));
        assert!(prompt.contains("newChart"));
    }
}
