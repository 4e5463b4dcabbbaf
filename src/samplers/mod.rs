// Copyright @yucwang 2026

pub mod seeder;
pub mod stochastic;
pub mod uniform;

pub use seeder::RandomStateSeeder;
pub use stochastic::StochasticSampleGenerator2D;
pub use uniform::UniformSampleGenerator2D;

pub const DEFAULT_WORK_GROUP_SIZE: usize = 256;
