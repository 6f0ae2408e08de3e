/// Knobs shared by parsing and rendering.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Options {
    /// Put fenced-code attributes on `<pre>` instead of `<code>`.
    pub code_attributes_on_pre: bool,
    /// Emit void elements as `<img ...>` rather than `<img ... />`.
    pub html5: bool,
    /// How many container blocks may nest before their content is kept as plain text.
    pub maximum_nesting_level: usize,
}

pub const DEFAULT_MAXIMUM_NESTING_LEVEL: usize = 32;

impl Default for Options {
    fn default() -> Self {
        Self {
            code_attributes_on_pre: false,
            html5: false,
            maximum_nesting_level: DEFAULT_MAXIMUM_NESTING_LEVEL,
        }
    }
}
