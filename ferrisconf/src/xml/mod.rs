//! Owned XML element trees.
//!
//! Every request sent to the device and every reply decoded from it goes
//! through [`Element`]. Building is done with chained constructors, reading
//! with slash-separated paths over local (prefix-free) names.

mod element;

pub use element::Element;
