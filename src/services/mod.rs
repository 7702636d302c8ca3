// 服务模块
// 提供核心业务逻辑服务

pub mod catalog;
pub mod codeforces;
pub mod database;
pub mod sync;

pub use catalog::{parse_problem_link, Catalog};
pub use codeforces::CodeforcesClient;
pub use database::DatabaseService;
pub use sync::{collect_solved, merge_solved, reconcile};
