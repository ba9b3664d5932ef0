//! Prometheus text exposition format.
//!
//! Renders collected samples into the text format (version 0.0.4) for
//! scraping by a Prometheus server or compatible agent.

use std::fmt::Write;
use std::sync::Arc;

use crate::metric::{Desc, Sample};

/// Content type of [`render_prometheus`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render samples grouped under their descriptors.
///
/// Families are written in descriptor order. A family without samples is
/// omitted entirely, HELP and TYPE lines included. Samples within a family
/// are sorted by label values.
pub fn render_prometheus(descs: &[Arc<Desc>], samples: &[Sample]) -> String {
    let mut out = String::new();

    for desc in descs {
        let mut family: Vec<&Sample> = samples
            .iter()
            .filter(|s| s.desc.name == desc.name)
            .collect();
        if family.is_empty() {
            continue;
        }
        family.sort_by(|a, b| a.label_values.cmp(&b.label_values));

        let _ = writeln!(out, "# HELP {} {}", desc.name, escape_help(&desc.help));
        let _ = writeln!(out, "# TYPE {} {}", desc.name, desc.kind.as_str());
        for sample in family {
            write_sample(&mut out, desc, sample);
        }
    }

    out
}

fn write_sample(out: &mut String, desc: &Desc, sample: &Sample) {
    out.push_str(&desc.name);
    if !desc.label_names.is_empty() {
        out.push('{');
        for (i, (name, value)) in desc.label_names.iter().zip(&sample.label_values).enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{name}=\"{}\"", escape_label_value(value));
        }
        out.push('}');
    }
    out.push(' ');
    out.push_str(&format_value(sample.value));
    out.push('\n');
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{value}")
    }
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}
