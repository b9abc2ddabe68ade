/*
    Sync subsystem - Filter/inventory reconciliation

    A requester summarizes what it holds as a DataFilter; the responder
    answers with an Inventory of everything the filter does not cover.
*/

pub mod filter;
pub mod inventory;

pub use filter::{DataFilter, FilterEntry};
pub use inventory::{compute_inventory, Inventory, InventoryCandidate};
