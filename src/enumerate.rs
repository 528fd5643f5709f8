//! Prints the locations held in a record collection.

use std::io::{self, Write};

use crate::db::RecordCollection;

/// Write each record's location on its own line, in collection order.
///
/// Returns the number of lines written.
pub fn enumerate<C, W>(db: &C, out: &mut W) -> io::Result<usize>
where
    C: RecordCollection + ?Sized,
    W: Write + ?Sized,
{
    let mut lines = 0;
    for (_, record) in db.iter() {
        writeln!(out, "{}", record.location())?;
        lines += 1;
    }
    out.flush()?;
    Ok(lines)
}
