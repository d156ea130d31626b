//! How a value is laid out at its read site.

/// Per-field metadata attached at each read site.
///
/// ```rust
/// use content_intermediate::Format;
///
/// let format = Format::new("Texture").with_allow_null(false);
/// assert_eq!(format.element_name, "Texture");
/// assert!(!format.flatten);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format {
    /// Name of the element holding the value.
    pub element_name: String,
    /// The value is written inline in its parent element instead of in a child element.
    pub flatten: bool,
    /// Whether `Null="true"` is accepted. Defaults to `true`.
    pub allow_null: bool,
    /// Whether a reflective field may be absent from the document.
    pub optional: bool,
}

impl Format {
    pub fn new(element_name: impl Into<String>) -> Self {
        Self {
            element_name: element_name.into(),
            flatten: false,
            allow_null: true,
            optional: false,
        }
    }

    pub fn flattened(mut self) -> Self {
        self.flatten = true;
        self
    }

    pub fn with_allow_null(mut self, allow_null: bool) -> Self {
        self.allow_null = allow_null;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}
