//! `SeaORM` entity definitions.

pub mod dead_letter_images;
pub mod images;
