//! Graphviz rendering of the model structure

use std::fs;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use super::network::DenseNet;
use crate::error::Result;

impl DenseNet {
    /// DOT description of the layer chain
    pub fn to_dot(&self) -> String {
        let layers = self.layer_summaries();
        let mut dot = String::from("digraph densenet {\n    rankdir=TB;\n    node [shape=record, fontname=\"Helvetica\"];\n");

        for (i, layer) in layers.iter().enumerate() {
            dot.push_str(&format!(
                "    l{} [label=\"{{{}|{:?}|params: {}}}\"];\n",
                i, layer.name, layer.output_shape, layer.parameters
            ));
        }
        for i in 1..layers.len() {
            dot.push_str(&format!("    l{} -> l{};\n", i - 1, i));
        }

        dot.push_str("}\n");
        dot
    }

    /// Write `<path>.dot` and render it to `path` with the `dot` tool
    ///
    /// Best-effort: any failure is logged at debug level and reported as
    /// `false`.
    pub fn render_diagram<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        match self.try_render_diagram(path) {
            Ok(true) => {
                info!("Model diagram written to {}", path.display());
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!("Skipping model diagram: {}", e);
                false
            }
        }
    }

    fn try_render_diagram(&self, path: &Path) -> Result<bool> {
        let dot_path = path.with_extension("dot");
        crate::utils::ensure_parent_dir(&dot_path)?;
        fs::write(&dot_path, self.to_dot())?;

        let status = Command::new("dot")
            .arg("-Tpng")
            .arg(&dot_path)
            .arg("-o")
            .arg(path)
            .status()?;

        if !status.success() {
            debug!("dot exited with {}", status);
        }
        Ok(status.success())
    }
}
