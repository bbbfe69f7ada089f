mod fake;
mod sync;
