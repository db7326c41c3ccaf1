pub mod gbm;
