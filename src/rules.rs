//! The standard editing rules.
//!
//! - `template`: renders `{{var}}` in property names and string values.
//! - `reference`: substitutes named reference objects.
//! - `conditional`: `?A=B` / `?A` / `?default` sibling branches, resolved as a
//!   filter + union once the whole object has been scanned.
//! - `multi-value`: `[[var]]=a,b` and `*var=a,b` expansion.
pub mod conditional;
pub mod multi_value;
pub mod reference;
pub mod template;

pub use conditional::ConditionalRule;
pub use multi_value::MultiValueRule;
pub use reference::ReferenceRule;
pub use template::TemplateRule;
