pub mod sg_display;
pub mod sg_graph;
