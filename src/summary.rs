//! Keras-style textual model summaries.

use std::fmt;

use serde::Serialize;

use crate::model::Model;

pub const DEFAULT_LINE_LENGTH: usize = 65;

/// Column end positions as fractions of the line length.
const COLUMN_STOPS: [f64; 3] = [0.45, 0.85, 1.0];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub layer: String,
    pub class_name: &'static str,
    pub output_shape: String,
    pub params: usize,
}

/// Layer table plus parameter totals of one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub model: String,
    pub rows: Vec<SummaryRow>,
    pub total_params: usize,
    pub trainable_params: usize,
    pub non_trainable_params: usize,
    #[serde(skip)]
    line_length: usize,
}

impl Summary {
    pub fn new(model: &Model) -> Self {
        let rows = model
            .layers
            .iter()
            .map(|layer| SummaryRow {
                layer: layer.name.clone(),
                class_name: layer.class_name(),
                output_shape: layer.output_shape.batched(),
                params: layer.param_count(),
            })
            .collect();
        let total_params = model.param_count();
        let trainable_params = model.trainable_param_count();
        Self {
            model: model.name.clone(),
            rows,
            total_params,
            trainable_params,
            non_trainable_params: total_params - trainable_params,
            line_length: DEFAULT_LINE_LENGTH,
        }
    }

    pub fn with_line_length(mut self, line_length: usize) -> Self {
        self.line_length = line_length.max(COLUMN_STOPS.len());
        self
    }

    fn positions(&self) -> [usize; 3] {
        COLUMN_STOPS.map(|stop| (self.line_length as f64 * stop) as usize)
    }
}

/// Lays fields out left-aligned, each cut or padded to end at its column stop.
fn format_row(fields: &[&str], positions: &[usize]) -> String {
    let mut line = String::new();
    for (i, (field, &stop)) in fields.iter().zip(positions).enumerate() {
        if i > 0 {
            line.pop();
            line.push(' ');
        }
        line.push_str(field);
        if line.chars().count() > stop {
            line = line.chars().take(stop).collect();
        }
        let width = line.chars().count();
        line.extend(std::iter::repeat_n(' ', stop - width));
    }
    line
}

/// `128906` -> `128,906`.
pub fn with_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positions = self.positions();
        let rule = |c: char| c.to_string().repeat(self.line_length);

        writeln!(f, "Model: \"{}\"", self.model)?;
        writeln!(f, "{}", rule('_'))?;
        writeln!(
            f,
            "{}",
            format_row(&["Layer (type)", "Output Shape", "Param #"], &positions)
        )?;
        writeln!(f, "{}", rule('='))?;
        for (i, row) in self.rows.iter().enumerate() {
            let label = format!("{} ({})", row.layer, row.class_name);
            let params = row.params.to_string();
            writeln!(
                f,
                "{}",
                format_row(&[&label, &row.output_shape, &params], &positions)
            )?;
            let separator = if i + 1 == self.rows.len() { '=' } else { '_' };
            writeln!(f, "{}", rule(separator))?;
        }
        if self.rows.is_empty() {
            writeln!(f, "{}", rule('='))?;
        }
        writeln!(f, "Total params: {}", with_thousands(self.total_params))?;
        writeln!(f, "Trainable params: {}", with_thousands(self.trainable_params))?;
        writeln!(
            f,
            "Non-trainable params: {}",
            with_thousands(self.non_trainable_params)
        )?;
        writeln!(f, "{}", rule('_'))
    }
}
