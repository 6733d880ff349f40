/// A checkpoint known by a friendly name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelPreset {
    pub name: &'static str,
    pub urn: &'static str,
}

/// Presets offered to users. The first one is the default model.
pub const PRESETS: &[ModelPreset] = &[
    ModelPreset {
        name: "Realistic-Mix",
        urn: "urn:air:sd1:checkpoint:civitai:4384@128713",
    },
    ModelPreset {
        name: "TMND-Mix",
        urn: "urn:air:sd1:checkpoint:civitai:27259@221220",
    },
];

/// Resolves a preset name to its URN. Anything else is taken as a URN as-is.
pub fn resolve_model(model: &str) -> &str {
    PRESETS
        .iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(model))
        .map_or(model, |preset| preset.urn)
}
