//! Integration tests for the edit session and transform coordinator

mod coordinator_flow;
