pub mod manifold_candidate_helper;

pub mod circle_pair_tester;
pub mod polygon_circle_tester;
pub mod polygon_pair_tester;
pub mod edge_circle_tester;
pub mod edge_polygon_tester;
