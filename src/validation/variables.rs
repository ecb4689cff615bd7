//! Variable template merging
//!
//! The variable template shown to module consumers combines user-declared
//! manifest entries with entries derived from the documented input
//! variables. Entries are matched by variable name; a manifest entry fully
//! replaces the tool-derived entry of the same name. Manifest entries come
//! first, remaining tool-derived entries follow, each group in its
//! original order.

use crate::core::metadata::{TerraformInput, VariableTemplateEntry};
use std::collections::HashSet;

/// Merge manifest-declared entries with tool-derived input variables
pub fn merge_variable_template(
    manifest_entries: &[VariableTemplateEntry],
    tool_inputs: &[TerraformInput],
) -> Vec<VariableTemplateEntry> {
    let declared: HashSet<&str> = manifest_entries
        .iter()
        .map(|entry| entry.name.as_str())
        .collect();

    let mut merged: Vec<VariableTemplateEntry> = manifest_entries.to_vec();
    merged.extend(
        tool_inputs
            .iter()
            .filter(|input| !declared.contains(input.name.as_str()))
            .map(entry_from_input),
    );
    merged
}

/// Convert a documented input variable into a template entry
fn entry_from_input(input: &TerraformInput) -> VariableTemplateEntry {
    VariableTemplateEntry {
        name: input.name.clone(),
        variable_type: if input.variable_type.is_empty() {
            "text".to_string()
        } else {
            input.variable_type.clone()
        },
        quote_value: input.variable_type.contains("string"),
        required: input.required,
        default_value: input.default.clone(),
        additional_help: input.description.clone(),
    }
}
