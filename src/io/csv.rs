/*!
# I/O Utilities for Saving Island Walks to CSV

This module writes trajectories and visit tallies to CSV files for external plotting tools.
Enable via the `csv` feature.
*/

use ndarray::{Array2, Axis};
use std::error::Error;
use std::fs::File;

use csv::Writer;

/**
Saves walker trajectories as a CSV file.

The data is expected to be in a shape of **chain × week**, as returned by
[`ChainRunner::run`](crate::core::ChainRunner::run).

The resulting CSV file has a header row `chain,week,island` followed by one row per recorded
position.

# Examples

```rust
use king_markov::io::csv::save_csv;
use ndarray::arr2;

let data = arr2(&[[10usize, 9, 9], [1, 10, 1]]);
save_csv(&data, "/tmp/king_markov_weeks.csv").expect("Expecting saving data to succeed");
```
*/
pub fn save_csv(trajectories: &Array2<usize>, filename: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);
    wtr.write_record(["chain", "week", "island"])?;

    for (chain_idx, chain) in trajectories.axis_iter(Axis(0)).enumerate() {
        for (week, island) in chain.iter().enumerate() {
            wtr.write_record(&[chain_idx.to_string(), week.to_string(), island.to_string()])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Saves visit counts (index `k - 1` for island `k`) as `island,visits,frequency` rows.
pub fn save_frequencies_csv(counts: &[u64], filename: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);
    wtr.write_record(["island", "visits", "frequency"])?;

    let total = counts.iter().sum::<u64>().max(1) as f64;
    for (i, &visits) in counts.iter().enumerate() {
        wtr.write_record(&[
            (i + 1).to_string(),
            visits.to_string(),
            (visits as f64 / total).to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
