use glob::{Pattern, PatternError};
use serde::Deserialize;

const DATALOG_TOKEN: &str = "datalog";
const TABULAR_EXTENSION: &str = ".csv";

/// Which files in the input directory are picked up by a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "SelectionRepr")]
pub enum FileSelection {
    /// Name contains `datalog` (any case) and ends with `.csv`.
    #[default]
    Datalog,
    All,
    Glob(Pattern),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum SelectionRepr {
    Datalog,
    All,
    Glob(String),
}

impl TryFrom<SelectionRepr> for FileSelection {
    type Error = PatternError;

    fn try_from(value: SelectionRepr) -> Result<Self, Self::Error> {
        Ok(match value {
            SelectionRepr::Datalog => FileSelection::Datalog,
            SelectionRepr::All => FileSelection::All,
            SelectionRepr::Glob(pattern) => FileSelection::Glob(Pattern::new(&pattern)?),
        })
    }
}

impl FileSelection {
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            FileSelection::Datalog => {
                let lower = file_name.to_ascii_lowercase();
                lower.contains(DATALOG_TOKEN) && lower.ends_with(TABULAR_EXTENSION)
            }
            FileSelection::All => true,
            FileSelection::Glob(pattern) => pattern.matches(file_name),
        }
    }
}
