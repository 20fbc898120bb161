//! Human-readable caveats about the data behind a reference.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clip::ClipSet;
use crate::config::EngineConfig;
use crate::error::{NaturwbError, Result};
use crate::model::{DistanceVariable, QualityFlag, SimulationInfo, StdVariable};
use crate::resolver::Resolution;

pub const BUILTIN_MESSAGES: &str = include_str!("data/messages.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaMessages {
    pub all: String,
    pub part: String,
}

/// Message templates. Placeholders are written as `{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCatalog {
    pub area_undef: AreaMessages,
    pub bfid_undef: String,
    /// Keys `1`, `1_resolved`, `1_notresolved` and `2`.
    pub lanu_flag: BTreeMap<String, String>,
    /// Per flag an `allg` header plus one segment per flag code.
    pub flags: BTreeMap<QualityFlag, BTreeMap<String, String>>,
    pub std: BTreeMap<StdVariable, String>,
    /// Weather stations whose values are known to be unrepresentative.
    pub special_stat_ids: BTreeMap<i64, String>,
}

impl MessageCatalog {
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_MESSAGES)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: MessageCatalog = serde_json::from_str(json)?;
        for key in ["1", "1_resolved", "1_notresolved", "2"] {
            if !catalog.lanu_flag.contains_key(key) {
                return Err(NaturwbError::Config(format!(
                    "message catalog is missing lanu_flag.{key}"
                )));
            }
        }
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    fn lanu(&self, key: &str) -> &str {
        self.lanu_flag.get(key).map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Dotted message id, e.g. `area_undef.part` or `sl_std`.
    pub key: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub messages: Vec<Message>,
}

impl Diagnostics {
    pub fn get(&self, key: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|m| m.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All messages as a bullet list, one per line.
    pub fn to_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("- {}", m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&mut self, key: impl Into<String>, text: String) {
        self.messages.push(Message {
            key: key.into(),
            text,
        });
    }
}

/// Substitute every `{name}` in `template`. Unknown placeholders stay as they are.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut text = template.to_string();
    for (name, value) in vars {
        text = text.replace(&format!("{{{name}}}"), value);
    }
    text
}

fn percent(share: f64) -> String {
    format!("{:.1} %", share * 100.0)
}

fn meters(distance: f64) -> String {
    format!("{distance:.0} m")
}

fn kilometers(distance: f64) -> String {
    format!("{distance:.0} km")
}

fn vars<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Build all messages for one query, in a fixed order.
pub fn diagnose(
    clip: &ClipSet,
    infos: &[SimulationInfo],
    resolution: &Resolution,
    config: &EngineConfig,
    catalog: &MessageCatalog,
) -> Result<Diagnostics> {
    let anteil = clip.anteil_by_sim()?;
    let weighted: Vec<(&SimulationInfo, f64)> = infos
        .iter()
        .map(|info| (info, anteil.get(&info.sim_id).copied().unwrap_or(0.0)))
        .collect();
    let material = config.materiality_share;

    let mut out = Diagnostics::default();
    undefined_area(clip, config, catalog, &mut out);
    undefined_soil(&weighted, catalog, &mut out);
    missing_landuse(clip, resolution, material, catalog, &mut out);
    forced_landuse(&weighted, config, catalog, &mut out);

    let distances = distance_stats(&weighted);
    for flag in QualityFlag::ALL {
        if flag == QualityFlag::LanuFlag {
            continue;
        }
        if let Some(templates) = catalog.flags.get(&flag) {
            flag_summary(flag, templates, &weighted, &distances, material, &mut out);
        }
    }

    for variable in StdVariable::ALL {
        let (Some(threshold), Some(template)) =
            (config.std_threshold(variable), catalog.std.get(&variable))
        else {
            continue;
        };
        let above: Vec<(f64, f64)> = weighted
            .iter()
            .filter_map(|(info, a)| info.std_dev(variable).map(|s| (s, *a)))
            .filter(|(s, _)| *s >= threshold)
            .collect();
        let share: f64 = above.iter().map(|(_, a)| a).sum();
        if share > material {
            let max_std = above.iter().map(|(s, _)| *s).fold(f64::MIN, f64::max);
            out.push(
                variable.column(),
                render(
                    template,
                    &vars([
                        ("anteil", percent(share)),
                        ("grenze_std", format!("{threshold}")),
                        ("max_std", format!("{max_std:.2}")),
                    ]),
                ),
            );
        }
    }

    for (stat_id, template) in &catalog.special_stat_ids {
        let driven: Vec<f64> = weighted
            .iter()
            .filter(|(info, _)| info.stat_id == Some(*stat_id))
            .map(|(_, a)| *a)
            .collect();
        if !driven.is_empty() {
            out.push(
                format!("special_stat_ids.{stat_id}"),
                render(template, &vars([("anteil", percent(driven.iter().sum()))])),
            );
        }
    }

    tracing::debug!(
        target: "naturwb::diagnostics",
        messages = out.len(),
        keys = ?out.keys().collect::<Vec<_>>(),
        "diagnostics.built"
    );
    Ok(out)
}

fn undefined_area(
    clip: &ClipSet,
    config: &EngineConfig,
    catalog: &MessageCatalog,
    out: &mut Diagnostics,
) {
    if !(clip.input_area() > 0.0) {
        return;
    }
    let defined = (clip.total_area() / clip.input_area()).min(1.0);
    let undefined = 1.0 - defined;
    if undefined > config.undefined_area_all_share {
        out.push(
            "area_undef.all",
            render(
                &catalog.area_undef.all,
                &vars([("area_undef_anteil", percent(undefined))]),
            ),
        );
    } else if undefined > config.materiality_share {
        out.push(
            "area_undef.part",
            render(
                &catalog.area_undef.part,
                &vars([
                    ("area_def_anteil", percent(defined)),
                    ("area_undef_anteil", percent(undefined)),
                ]),
            ),
        );
    }
}

fn undefined_soil(weighted: &[(&SimulationInfo, f64)], catalog: &MessageCatalog, out: &mut Diagnostics) {
    if weighted.iter().map(|(i, _)| i.bfid_undef).sum::<f64>() > 0.0 {
        let share: f64 = weighted.iter().map(|(i, a)| i.bfid_undef / 100.0 * a).sum();
        out.push(
            "bfid_undef",
            render(&catalog.bfid_undef, &vars([("bfid_undef", percent(share))])),
        );
    }
}

fn missing_landuse(
    clip: &ClipSet,
    resolution: &Resolution,
    material: f64,
    catalog: &MessageCatalog,
    out: &mut Diagnostics,
) {
    let total = clip.total_area();
    let mut resolved = 0.0;
    let mut unresolved = 0.0;
    let mut radii = Vec::new();
    for missing in resolution.missing().values() {
        let share = missing.area / total;
        if missing.resolved {
            resolved += share;
            radii.extend(missing.radius_km);
        } else {
            unresolved += share;
        }
    }
    let missing_share = resolved + unresolved;
    if !(missing_share > material) {
        return;
    }

    let mut text = render(
        catalog.lanu("1"),
        &vars([("anteil_nolanu", percent(missing_share))]),
    );
    if !radii.is_empty() {
        let dist_mean = radii.iter().sum::<f64>() / radii.len() as f64;
        text += &render(
            catalog.lanu("1_resolved"),
            &vars([
                ("anteil_nolanu_resolved", percent(resolved / missing_share)),
                ("dist_mean", kilometers(dist_mean)),
            ]),
        );
    }
    if resolution.unresolved_pairs().next().is_some() {
        text += &render(
            catalog.lanu("1_notresolved"),
            &vars([
                ("anteil_nolanu_notresolved", percent(unresolved / missing_share)),
                ("anteil_lanu_notresolved_tot", percent(unresolved)),
            ]),
        );
    }
    out.push("lanu_flag.1", text);
}

fn forced_landuse(
    weighted: &[(&SimulationInfo, f64)],
    config: &EngineConfig,
    catalog: &MessageCatalog,
    out: &mut Diagnostics,
) {
    let share: f64 = weighted
        .iter()
        .filter(|(i, _)| i.lanu_flag == config.forced_landuse_flag)
        .map(|(_, a)| a)
        .sum();
    if share > config.materiality_share {
        out.push(
            "lanu_flag.2",
            render(catalog.lanu("2"), &vars([("anteil_2", percent(share))])),
        );
    }
}

/// Area-weighted mean and maximum of each fill distance, as template variables.
fn distance_stats(weighted: &[(&SimulationInfo, f64)]) -> BTreeMap<String, String> {
    let mut stats = BTreeMap::new();
    for variable in DistanceVariable::ALL {
        let known: Vec<(f64, f64)> = weighted
            .iter()
            .filter_map(|(info, a)| info.distance(variable).map(|d| (d, *a)))
            .collect();
        if known.iter().map(|(d, _)| d).sum::<f64>() == 0.0 {
            continue;
        }
        let weight: f64 = known.iter().map(|(_, a)| a).sum();
        let mean = if weight > 0.0 {
            known.iter().map(|(d, a)| d * a).sum::<f64>() / weight
        } else {
            known.iter().map(|(d, _)| d).sum::<f64>() / known.len() as f64
        };
        let max = known.iter().map(|(d, _)| *d).fold(f64::MIN, f64::max);
        stats.insert(format!("{}_mean", variable.column()), meters(mean));
        stats.insert(format!("{}_max", variable.column()), meters(max));
    }
    stats
}

fn flag_summary(
    flag: QualityFlag,
    templates: &BTreeMap<String, String>,
    weighted: &[(&SimulationInfo, f64)],
    distances: &BTreeMap<String, String>,
    material: f64,
    out: &mut Diagnostics,
) {
    let mut by_code: BTreeMap<u8, f64> = BTreeMap::new();
    for (info, a) in weighted {
        let code = info.flag(flag);
        if code != 0 {
            *by_code.entry(code).or_insert(0.0) += a;
        }
    }
    by_code.retain(|_, share| *share > material);
    if by_code.is_empty() {
        return;
    }

    let mut vars = distances.clone();
    vars.insert("anteil_all".into(), percent(by_code.values().sum()));
    for (code, share) in &by_code {
        vars.insert(format!("anteil_{code}"), percent(*share));
    }

    let body: String = by_code
        .keys()
        .filter_map(|code| templates.get(&code.to_string()))
        .map(|template| render(template, &vars))
        .collect();
    if body.is_empty() {
        return;
    }
    let header = templates
        .get("allg")
        .map(|t| render(t, &vars))
        .unwrap_or_default();
    out.push(flag.column(), header + &body);
}
