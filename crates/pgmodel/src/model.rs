//! Model metadata consumed by the query facade.

/// Static description of one application model bound to a table.
///
/// Models are never instantiated by pgmodel: the implementing type is only used
/// as a key and a source of constants, so an uninhabited enum is a perfectly
/// good model.
///
/// ```
/// use pgmodel::Model;
///
/// enum User {}
///
/// impl Model for User {
///     const TABLE: &'static str = "users";
///     const UPDATE_TIMESTAMPS: bool = true;
/// }
///
/// assert_eq!(User::FIELDS, ["*"]);
/// ```
pub trait Model: 'static {
    /// Table bound when a chain does not name one explicitly.
    const TABLE: &'static str;

    /// Field list bound together with the default table.
    const FIELDS: &'static [&'static str] = &["*"];

    /// Whether `save` / `save_bulk` ask the builder to fill timestamp columns.
    const UPDATE_TIMESTAMPS: bool = false;
}
