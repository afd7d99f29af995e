pub mod allocation;
pub mod optimizer;
pub mod strategy;
pub mod validator;

pub use allocation::{Allocation, Position};
pub use optimizer::BudgetOptimizer;
pub use strategy::{Allocator, Band, Strategy, StrategyBands};
pub use validator::{Validation, ValidationError, validate};
