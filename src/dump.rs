//! NumPy-style printing of flattened weight tensors.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::init::WeightTensor;
use crate::shape::Shape;

/// Array print options, named after their NumPy counterparts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintOptions {
    /// Maximum fractional digits per element.
    pub precision: usize,
    /// Characters per line before wrapping.
    pub line_width: usize,
    /// Arrays longer than this are summarized with `...`. Unlimited by default so
    /// every element reaches the fixture.
    pub threshold: usize,
    /// Elements kept at each end of a summarized array.
    pub edge_items: usize,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            precision: 8,
            line_width: 75,
            threshold: usize::MAX,
            edge_items: 3,
        }
    }
}

/// Integer and fractional halves of a formatted element, split at the dot.
fn split_element(value: f32, precision: usize) -> (String, String) {
    if value.is_nan() {
        return ("nan".to_string(), String::new());
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        return (text.to_string(), String::new());
    }
    let text = format!("{value:.precision$}");
    match text.split_once('.') {
        Some((int, frac)) => (format!("{int}."), frac.trim_end_matches('0').to_string()),
        None => (format!("{text}."), String::new()),
    }
}

/// Formats `values` as a one-dimensional array, e.g. `[ 0.1  -0.25  0.  ]`.
pub fn format_array(values: &[f32], options: &PrintOptions) -> String {
    let summarize =
        values.len() > options.threshold && values.len() > options.edge_items.saturating_mul(2);
    let shown: Vec<Option<f32>> = if summarize {
        let tail = values.len() - options.edge_items;
        values[..options.edge_items]
            .iter()
            .map(|v| Some(*v))
            .chain(std::iter::once(None))
            .chain(values[tail..].iter().map(|v| Some(*v)))
            .collect()
    } else {
        values.iter().map(|v| Some(*v)).collect()
    };

    let parts: Vec<Option<(String, String)>> = shown
        .iter()
        .map(|v| v.map(|v| split_element(v, options.precision)))
        .collect();
    let int_width = parts.iter().flatten().map(|(i, _)| i.len()).max().unwrap_or(0);
    let frac_width = parts.iter().flatten().map(|(_, f)| f.len()).max().unwrap_or(0);

    let words: Vec<String> = parts
        .into_iter()
        .map(|part| match part {
            Some((int, frac)) => format!("{int:>int_width$}{frac:<frac_width$}"),
            None => "...".to_string(),
        })
        .collect();

    let mut out = String::new();
    let mut line = String::from("[");
    let mut line_has_words = false;
    for (i, word) in words.iter().enumerate() {
        let closing = usize::from(i + 1 == words.len());
        if line_has_words && line.len() + word.len() + closing > options.line_width {
            out.push_str(line.trim_end());
            out.push('\n');
            line = String::from(" ");
        }
        line_has_words = true;
        line.push_str(word);
        if i + 1 < words.len() {
            line.push(' ');
        }
    }
    out.push_str(&line);
    out.push(']');
    out
}

/// One tensor as it appears in a JSON weight dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightDump {
    pub index: usize,
    pub name: &'static str,
    pub shape: Shape,
    pub values: Vec<f32>,
}

impl WeightDump {
    pub fn collect(weights: &[WeightTensor]) -> Vec<Self> {
        weights
            .iter()
            .enumerate()
            .map(|(index, w)| Self {
                index,
                name: w.name,
                shape: w.shape.clone(),
                values: w.flatten().to_vec(),
            })
            .collect()
    }
}

/// Writes `<LABEL> WEIGHTS i SHAPED (..)` followed by the flattened values, per tensor.
pub fn write_weights<W: Write + ?Sized>(
    out: &mut W,
    label: &str,
    weights: &[WeightTensor],
    options: &PrintOptions,
) -> io::Result<()> {
    for (i, weight) in weights.iter().enumerate() {
        writeln!(out, "{label} WEIGHTS {i} SHAPED {}", weight.shape)?;
        writeln!(out, "{}", format_array(weight.flatten(), options))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_and_ones_print_bare() {
        let opts = PrintOptions::default();
        assert_eq!(format_array(&[0.0; 4], &opts), "[0. 0. 0. 0.]");
        assert_eq!(format_array(&[1.0, 1.0, 1.0], &opts), "[1. 1. 1.]");
        assert_eq!(format_array(&[], &opts), "[]");
    }

    #[test]
    fn mixed_signs_are_aligned() {
        let opts = PrintOptions::default();
        assert_eq!(format_array(&[0.5, -0.25, 2.0], &opts), "[ 0.5  -0.25  2.  ]");
    }

    #[test]
    fn precision_limits_fraction() {
        let opts = PrintOptions {
            precision: 3,
            ..PrintOptions::default()
        };
        assert_eq!(format_array(&[0.123456, -0.5], &opts), "[ 0.123 -0.5  ]");
    }

    #[test]
    fn long_arrays_wrap_within_line_width() {
        let opts = PrintOptions::default();
        let values: Vec<f32> = (0..40).map(|i| i as f32 * 0.125 - 2.0).collect();
        let text = format_array(&values, &opts);
        assert!(text.lines().count() > 1);
        assert!(text.lines().all(|l| l.len() <= opts.line_width));
        assert!(text.starts_with('['));
        assert!(text.ends_with(']'));
        assert!(text.lines().skip(1).all(|l| l.starts_with(' ')));
        let parsed: Vec<&str> = text
            .trim_matches(|c| c == '[' || c == ']')
            .split_whitespace()
            .collect();
        assert_eq!(parsed.len(), 40);
    }

    #[test]
    fn large_arrays_are_summarized() {
        let opts = PrintOptions {
            threshold: 10,
            ..PrintOptions::default()
        };
        let values: Vec<f32> = (0..20).map(|i| i as f32).collect();
        assert_eq!(format_array(&values, &opts), "[ 0.  1.  2. ... 17. 18. 19.]");
    }

    #[test]
    fn writes_header_per_tensor() {
        let weights = vec![
            WeightTensor {
                name: "kernel",
                shape: Shape::from([1, 2]),
                trainable: true,
                values: vec![0.5, -0.5],
            },
            WeightTensor {
                name: "bias",
                shape: Shape::from([2]),
                trainable: true,
                values: vec![0.0, 0.0],
            },
        ];
        let mut out = Vec::new();
        write_weights(&mut out, "CONV", &weights, &PrintOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "CONV WEIGHTS 0 SHAPED (1, 2)\n[ 0.5 -0.5]\nCONV WEIGHTS 1 SHAPED (2,)\n[0. 0.]\n"
        );
    }
}
