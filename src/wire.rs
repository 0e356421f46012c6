//! Wire serialization (spec.md §6): little-endian fixed-width `u32` lengths
//! and IEEE-754 `f64` reals, length-prefix-then-bytes for nested containers.

use crate::error::{DistributedTessellationError, Result};
use crate::geometry::Plc;

pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_f64_slice(buf: &mut Vec<u8>, v: &[f64]) {
    write_u32(buf, v.len() as u32);
    for &x in v {
        write_f64(buf, x);
    }
}

pub fn write_u32_slice(buf: &mut Vec<u8>, v: &[u32]) {
    write_u32(buf, v.len() as u32);
    for &x in v {
        write_u32(buf, x);
    }
}

pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        if self.pos + 4 > self.buf.len() {
            return Err(DistributedTessellationError::invalid_input(
                "truncated u32 in wire payload",
            ));
        }
        let v = u32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        if self.pos + 8 > self.buf.len() {
            return Err(DistributedTessellationError::invalid_input(
                "truncated f64 in wire payload",
            ));
        }
        let v = f64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    pub fn read_f64_vec(&mut self) -> Result<Vec<f64>> {
        let n = self.read_u32()? as usize;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_f64()?);
        }
        Ok(out)
    }

    pub fn read_u32_vec(&mut self) -> Result<Vec<u32>> {
        let n = self.read_u32()? as usize;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_u32()?);
        }
        Ok(out)
    }
}

/// Serialize a flat generator/hull point array: a `u32` count followed by
/// that many `f64`s (tag-1/tag-2 payloads in the generator-exchange phase,
/// and the hull-broadcast payload).
pub fn serialize_points(points: &[f64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + points.len() * 8);
    write_f64_slice(&mut buf, points);
    buf
}

pub fn deserialize_points(buf: &[u8]) -> Result<Vec<f64>> {
    let mut c = Cursor::new(buf);
    let v = c.read_f64_vec()?;
    Ok(v)
}

pub fn serialize_plc(plc: &Plc) -> Vec<u8> {
    let mut buf = Vec::new();
    write_u32(&mut buf, plc.facets.len() as u32);
    for f in &plc.facets {
        write_u32_slice(&mut buf, f);
    }
    write_u32(&mut buf, plc.holes.len() as u32);
    for hole in &plc.holes {
        write_u32(&mut buf, hole.len() as u32);
        for f in hole {
            write_u32_slice(&mut buf, f);
        }
    }
    buf
}

pub fn deserialize_plc(buf: &[u8]) -> Result<Plc> {
    let mut c = Cursor::new(buf);
    let nfacets = c.read_u32()? as usize;
    let mut facets = Vec::with_capacity(nfacets);
    for _ in 0..nfacets {
        facets.push(c.read_u32_vec()?);
    }
    let nholes = c.read_u32()? as usize;
    let mut holes = Vec::with_capacity(nholes);
    for _ in 0..nholes {
        let nf = c.read_u32()? as usize;
        let mut facs = Vec::with_capacity(nf);
        for _ in 0..nf {
            facs.push(c.read_u32_vec()?);
        }
        holes.push(facs);
    }
    Ok(Plc { facets, holes })
}

/// Serialize a hull broadcast payload: vertex coordinates plus the hull's
/// intrinsic dimension tag.
pub fn serialize_hull(points: &[f64], hull_dimension: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    write_u32(&mut buf, hull_dimension);
    write_f64_slice(&mut buf, points);
    buf
}

pub fn deserialize_hull(buf: &[u8]) -> Result<(Vec<f64>, u32)> {
    let mut c = Cursor::new(buf);
    let hull_dimension = c.read_u32()?;
    let points = c.read_f64_vec()?;
    Ok((points, hull_dimension))
}

/// Serialize a neighbor-rank list for the debug-mode symmetry check.
pub fn serialize_u32_list(v: &[u32]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_u32_slice(&mut buf, v);
    buf
}

pub fn deserialize_u32_list(buf: &[u8]) -> Result<Vec<u32>> {
    let mut c = Cursor::new(buf);
    c.read_u32_vec()
}
