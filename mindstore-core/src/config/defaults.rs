pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_BM25_ALPHA: f64 = 0.5;
pub const DEFAULT_QUALITY_BOOST_WEIGHT: f64 = 0.2;
pub const DEFAULT_MMR_LAMBDA: f64 = 0.5;
pub const DEFAULT_DECAY_RATE: f64 = 0.05;
pub const DEFAULT_ACCESS_WEIGHT: f64 = 0.1;
pub const DEFAULT_MAX_ACCESS_BOOST: f64 = 1.5;
