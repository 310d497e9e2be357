use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Writer};
use std::io::{Read, Write};

use crate::geo::{Station, StationId};

fn column(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow!("missing column {:?}", name))
}

fn field<T>(record: &StringRecord, idx: usize, line: u64) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = record
        .get(idx)
        .ok_or_else(|| anyhow!("line {}: missing field {}", line, idx))?;
    raw.trim()
        .parse()
        .with_context(|| format!("line {}: could not parse {:?}", line, raw))
}

/// Reads stations from CSV with an `id,lat,lng` header. Other columns are ignored.
pub fn read_stations<R: Read>(reader: R) -> Result<Vec<Station>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let (id_col, lat_col, lng_col) = (
        column(&headers, "id")?,
        column(&headers, "lat")?,
        column(&headers, "lng")?,
    );

    let mut stations = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let station = Station::new(
            field(&record, id_col, line)?,
            field(&record, lat_col, line)?,
            field(&record, lng_col, line)?,
        );
        if !station.has_valid_coordinates() {
            bail!(
                "line {}: station {} has out of range coordinates ({}, {})",
                line,
                station.id,
                station.lat,
                station.lon
            );
        }
        stations.push(station);
    }
    Ok(stations)
}

/// Reads undirected legs from CSV with a `from,to` header.
pub fn read_legs<R: Read>(reader: R) -> Result<Vec<(StationId, StationId)>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let (from_col, to_col) = (column(&headers, "from")?, column(&headers, "to")?);

    let mut legs = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        legs.push((field(&record, from_col, line)?, field(&record, to_col, line)?));
    }
    Ok(legs)
}

pub fn write_stations<W: Write>(writer: W, stations: &[Station]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["id", "lat", "lng"])?;
    for s in stations {
        wtr.write_record(&[
            s.id.to_string(),
            format!("{:.6}", s.lat),
            format!("{:.6}", s.lon),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
