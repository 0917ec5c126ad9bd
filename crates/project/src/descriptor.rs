//! `*.model.json` and `*.excel.json` descriptors

use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::schema::Problems;

/// Validate a JSON model description
pub fn validate_model(value: &Value, origin: &str) -> Result<()> {
    let mut problems = Problems::new(origin);
    scan_model(value, &mut problems);
    problems.finish(())
}

fn scan_model(value: &Value, problems: &mut Problems) {
    let Some(object) = value.as_object() else {
        problems.error("model must be an object");
        return;
    };

    if let Some(name) = object.get("Name") {
        problems.string("Name", name);
    }
    if let Some(class_name) = object.get("ClassName") {
        problems.string("ClassName", class_name);
    }
    if let Some(properties) = object.get("Properties") {
        problems.properties("Properties", properties);
    }
    if let Some(children) = object.get("Children") {
        match children.as_array() {
            Some(children) => children.iter().for_each(|child| scan_model(child, problems)),
            None => problems.error("Children must be an array"),
        }
    }
}

/// Validate a spreadsheet descriptor; `descriptor` is its absolute path
pub fn validate_excel(value: &Value, descriptor: &Path, origin: &str) -> Result<()> {
    let mut problems = Problems::new(origin);
    let Some(object) = value.as_object() else {
        problems.error("descriptor must be an object");
        return problems.finish(());
    };

    match object.get("spreadsheet") {
        None => problems.error("Missing key spreadsheet"),
        Some(spreadsheet) => {
            if let Some(spreadsheet) = problems.string("spreadsheet", spreadsheet) {
                let sheet = descriptor.parent().map(|dir| dir.join(&spreadsheet));
                if !sheet.is_some_and(|sheet| sheet.exists()) {
                    problems.error(format!("Spreadsheet {spreadsheet} does not exist"));
                }
            }
        }
    }

    match object.get("ref") {
        None => problems.error("Missing key ref"),
        Some(reference) => {
            problems.string("ref", reference);
        }
    }

    match object.get("hasHeader") {
        None => problems.error("Missing key hasHeader"),
        Some(has_header) => {
            problems.boolean("hasHeader", has_header);
        }
    }

    match object.get("numColumnKeys") {
        None => problems.error("Missing key numColumnKeys"),
        Some(count) if !count.is_number() => problems.error("numColumnKeys must be a number"),
        Some(_) => {}
    }

    problems.finish(())
}

/// `ClassName` of a JSON model, if it declares one
pub fn model_class_name(value: &Value) -> Option<&str> {
    value.get("ClassName").and_then(Value::as_str)
}
