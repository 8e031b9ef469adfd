//! The compilation session and `.sb3` packaging.

use crate::diagnostic::Diagnostic;
use crate::target::TargetCompiler;
use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

const DEFAULT_COSTUME_SVG: &str =
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1" viewBox="0 0 1 1"></svg>"##;
const AGENT: &str = "ScratchScript Rust Compiler";

/// One compilation: the stage, the default sprite and everything reported along the way.
#[derive(Debug)]
pub struct ProjectCompiler {
    targets: Vec<TargetCompiler>,
    current: usize,
    success: bool,
    ignore_errors: bool,
    diagnostics: Vec<Diagnostic>,
}

impl ProjectCompiler {
    pub fn new(sprite_name: &str) -> Self {
        Self {
            targets: vec![
                TargetCompiler::new("Stage", true, 0),
                TargetCompiler::new(sprite_name, false, 1),
            ],
            current: 1,
            success: true,
            ignore_errors: false,
            diagnostics: Vec::new(),
        }
    }

    pub fn targets(&self) -> &[TargetCompiler] {
        &self.targets
    }

    pub fn current_target(&self) -> &TargetCompiler {
        &self.targets[self.current]
    }

    pub fn current_target_mut(&mut self) -> &mut TargetCompiler {
        &mut self.targets[self.current]
    }

    /// Returns false when no target has that name.
    pub fn set_current_target(&mut self, name: &str) -> bool {
        match self.targets.iter().position(|t| t.name == name) {
            Some(index) => {
                self.current = index;
                log::debug!("switched current target to '{}'", name);
                true
            }
            None => false,
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.success = false;
        }
        log::debug!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn set_ignore_errors(&mut self, ignore: bool) {
        self.ignore_errors = ignore;
    }

    /// Packaging proceeds on success or when `@ignore_errors` was given.
    pub fn can_package(&self) -> bool {
        self.success || self.ignore_errors
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

pub fn write_sb3(project: &ProjectCompiler, output_path: &Path) -> Result<()> {
    let bytes = build_sb3_bytes(project)?;
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, bytes)?;
    Ok(())
}

pub fn build_sb3_bytes(project: &ProjectCompiler) -> Result<Vec<u8>> {
    let (project_json, assets) = build_project(project)?;
    let mut buffer = Cursor::new(Vec::<u8>::new());
    let mut zip = zip::ZipWriter::new(&mut buffer);
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("project.json", opts)?;
    let project_bytes = serde_json::to_vec_pretty(&project_json)?;
    zip.write_all(&project_bytes)?;

    let mut assets = assets.into_iter().collect::<Vec<_>>();
    assets.sort_by(|(left_name, _), (right_name, _)| left_name.cmp(right_name));
    for (name, bytes) in assets {
        zip.start_file(name, opts)?;
        zip.write_all(&bytes)?;
    }
    zip.finish()?;
    Ok(buffer.into_inner())
}

pub fn build_project_json(project: &ProjectCompiler) -> Result<Value> {
    build_project(project).map(|(json, _)| json)
}

fn build_project(project: &ProjectCompiler) -> Result<(Value, HashMap<String, Vec<u8>>)> {
    let mut assets = HashMap::new();
    let mut targets_json = Vec::new();
    for target in project.targets() {
        targets_json.push(build_target_json(target, &mut assets)?);
    }
    let project_json = json!({
        "targets": targets_json,
        "monitors": [],
        "extensions": [],
        "meta": {
            "semver": "3.0.0",
            "vm": "0.2.0",
            "agent": AGENT
        }
    });
    Ok((project_json, assets))
}

fn build_target_json(target: &TargetCompiler, assets: &mut HashMap<String, Vec<u8>>) -> Result<Value> {
    let mut variables = Map::new();
    for variable in target.variables().values() {
        variables.insert(
            variable.id.clone(),
            json!([variable.name, variable.ty.default_value()]),
        );
    }
    let mut blocks = Map::new();
    for (id, block) in target.blocks() {
        blocks.insert(id.clone(), serde_json::to_value(block)?);
    }
    let comments = serde_json::to_value(target.comments())?;

    let data = DEFAULT_COSTUME_SVG.as_bytes().to_vec();
    let digest = format!("{:x}", md5::compute(&data));
    let md5ext = format!("{}.svg", digest);
    assets.insert(md5ext.clone(), data);
    let costume = json!({
        "name": if target.is_stage { "backdrop1" } else { "costume1" },
        "assetId": digest,
        "md5ext": md5ext,
        "dataFormat": "svg",
        "rotationCenterX": 0.5,
        "rotationCenterY": 0.5
    });

    let mut target_json = json!({
        "isStage": target.is_stage,
        "name": target.name,
        "variables": variables,
        "lists": {},
        "broadcasts": {},
        "blocks": blocks,
        "comments": comments,
        "currentCostume": 0,
        "costumes": [costume],
        "sounds": [],
        "volume": 100,
        "layerOrder": target.layer_order
    });
    let extras = if target.is_stage {
        json!({
            "tempo": 60,
            "videoTransparency": 50,
            "videoState": "on",
            "textToSpeechLanguage": Value::Null
        })
    } else {
        json!({
            "visible": true,
            "x": 0,
            "y": 0,
            "size": 100,
            "direction": 90,
            "draggable": false,
            "rotationStyle": "all around"
        })
    };
    merge_object(&mut target_json, extras)?;
    Ok(target_json)
}

fn merge_object(target: &mut Value, extra: Value) -> Result<()> {
    let target = target
        .as_object_mut()
        .ok_or_else(|| anyhow!("Target JSON is not an object."))?;
    if let Value::Object(extra) = extra {
        target.extend(extra);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    #[test]
    fn test_session_starts_on_sprite() {
        let mut project = ProjectCompiler::new("Sprite1");
        assert_eq!(project.current_target().name, "Sprite1");
        assert!(project.set_current_target("Stage"));
        assert!(project.current_target().is_stage);
        assert!(!project.set_current_target("Nope"));
        assert!(project.current_target().is_stage);
    }

    #[test]
    fn test_errors_clear_success_but_warnings_do_not() {
        let mut project = ProjectCompiler::new("Sprite1");
        project.report(Diagnostic::new("W1", None, &[]));
        assert!(project.success());
        project.report(Diagnostic::new("E7", None, &["x"]));
        assert!(!project.success());
        assert!(!project.can_package());
        project.set_ignore_errors(true);
        assert!(project.can_package());
        assert_eq!(project.diagnostics().len(), 2);
    }

    #[test]
    fn test_project_json_shape() {
        let mut project = ProjectCompiler::new("Sprite1");
        project
            .current_target_mut()
            .create_variable("score", ValueType::Number);
        let json = build_project_json(&project).unwrap();

        assert_eq!(json["meta"]["semver"], "3.0.0");
        let targets = json["targets"].as_array().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0]["isStage"], true);
        assert_eq!(targets[0]["layerOrder"], 0);
        assert_eq!(targets[0]["tempo"], 60);
        assert_eq!(targets[1]["name"], "Sprite1");
        assert_eq!(targets[1]["rotationStyle"], "all around");
        let variables = targets[1]["variables"].as_object().unwrap();
        let (_, entry) = variables.iter().next().unwrap();
        assert_eq!(entry, &json!(["score", 0]));
        assert_eq!(targets[1]["costumes"][0]["name"], "costume1");
    }
}
