pub mod contact_solver;
