// Social interaction graph: extraction, decay weighting, aggregation, ranking.
//
// Everything in here is a pure, synchronous transform over in-memory tables.
// I/O lives at the edges (signal/ for input, output/ for files).

pub mod aggregate;
pub mod decay;
pub mod interactions;
pub mod ranking;
pub mod remap;
