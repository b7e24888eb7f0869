pub mod clough_tocher;
pub mod clustering;
pub mod composer;
pub mod interpolation;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod scaling;
pub mod triangulation;
