use std::fmt;
use std::str::FromStr;

/// Analysis category attached to a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Task {
    Review,
    Summarize,
    Insights,
    Solutions,
    #[default]
    None,
}

impl Task {
    pub const ALL: [Task; 5] = [
        Task::Review,
        Task::Summarize,
        Task::Insights,
        Task::Solutions,
        Task::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Review => "review",
            Task::Summarize => "summarize",
            Task::Insights => "insights",
            Task::Solutions => "solutions",
            Task::None => "none",
        }
    }

    /// Fixed prompt prefix, empty for `Task::None`.
    pub fn prompt_prefix(&self) -> &'static str {
        match self {
            Task::Review => "Review the following business document and provide a comprehensive analysis: ",
            Task::Summarize => "Summarize the following business document concisely: ",
            Task::Insights => "Extract key insights and opportunities from the following business document: ",
            Task::Solutions => "Generate strategic solutions based on the following business problem: ",
            Task::None => "",
        }
    }

    /// Canned request for a task button. With no documents attached it asks
    /// for an upload instead.
    pub fn quick_prompt(&self, file_count: usize) -> Option<String> {
        let noun = if file_count > 1 { "documents" } else { "document" };
        let text = match (self, file_count) {
            (Task::None, _) => return None,
            (Task::Review, 0) => "Please upload a document for me to review.".to_string(),
            (Task::Summarize, 0) => "Please upload a document for me to summarize.".to_string(),
            (Task::Insights, 0) => "Please upload a document to extract insights from.".to_string(),
            (Task::Solutions, 0) => "Please upload a document for me to generate solutions for.".to_string(),
            (Task::Review, _) => format!("Please review the attached {}.", noun),
            (Task::Summarize, _) => format!("Please summarize the attached {}.", noun),
            (Task::Insights, _) => format!("Please provide key insights from the attached {}.", noun),
            (Task::Solutions, _) => format!("Please generate a solution based on the attached {}.", noun),
        };
        Some(text)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task '{0}' (expected review, summarize, insights, solutions or none)")]
pub struct UnknownTask(pub String);

impl FromStr for Task {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "review" => Ok(Task::Review),
            "summarize" | "summary" => Ok(Task::Summarize),
            "insights" => Ok(Task::Insights),
            "solutions" => Ok(Task::Solutions),
            "none" | "" => Ok(Task::None),
            other => Err(UnknownTask(other.to_string())),
        }
    }
}

pub fn build_prompt(task: Task, message: &str) -> String {
    format!("{}{}", task.prompt_prefix(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_ends_with_message_for_every_task() {
        let message = "Q3 revenue fell 12% while churn doubled.";
        for task in Task::ALL {
            let prompt = build_prompt(task, message);
            assert!(prompt.ends_with(message), "{task}: {prompt}");
            assert!(prompt.starts_with(task.prompt_prefix()));
        }
    }

    #[test]
    fn none_passes_message_through() {
        assert_eq!(build_prompt(Task::None, "hello"), "hello");
    }

    #[test]
    fn prefixes_are_distinct() {
        let prefixes: std::collections::HashSet<_> =
            Task::ALL.iter().map(|t| t.prompt_prefix()).collect();
        assert_eq!(prefixes.len(), Task::ALL.len());
    }

    #[test]
    fn summarize_template() {
        assert_eq!(
            build_prompt(Task::Summarize, "doc"),
            "Summarize the following business document concisely: doc"
        );
    }

    #[test]
    fn parses_task_names() {
        assert_eq!("Review".parse::<Task>(), Ok(Task::Review));
        assert_eq!(" insights ".parse::<Task>(), Ok(Task::Insights));
        assert_eq!("".parse::<Task>(), Ok(Task::None));
        assert!("translate".parse::<Task>().is_err());
    }

    #[test]
    fn quick_prompt_pluralizes() {
        assert_eq!(
            Task::Review.quick_prompt(1).as_deref(),
            Some("Please review the attached document.")
        );
        assert_eq!(
            Task::Summarize.quick_prompt(3).as_deref(),
            Some("Please summarize the attached documents.")
        );
        assert!(Task::None.quick_prompt(2).is_none());
    }

    #[test]
    fn quick_prompt_without_files_asks_for_upload() {
        assert_eq!(
            Task::Review.quick_prompt(0).as_deref(),
            Some("Please upload a document for me to review.")
        );
        assert_eq!(
            Task::Insights.quick_prompt(0).as_deref(),
            Some("Please upload a document to extract insights from.")
        );
        for task in Task::ALL {
            if let Some(prompt) = task.quick_prompt(0) {
                assert!(prompt.starts_with("Please upload"), "{task}: {prompt}");
            }
        }
        assert!(Task::None.quick_prompt(0).is_none());
    }
}
