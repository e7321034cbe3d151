//! Serialized model container.
//!
//! A saved model is a gzip stream whose payload starts with the `OLV1`
//! magic, a format version byte and the package/SCC counts, followed by a
//! bincode-encoded body: name table, CSR arrays, SCC arrays and every
//! metric result cached at save time. Loading validates magic, version and
//! all structural invariants; any mismatch (including a failing gzip CRC)
//! surfaces as `CorruptedModel`.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::condense::{Condensation, CondensationParts};
use crate::graph::{Csr, PackageGraph};
use crate::model::{ModelError, PackageNetwork};
use crate::stats::MetricStats;

const MAGIC: [u8; 4] = *b"OLV1";
const FORMAT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct ModelBody {
    names: Vec<String>,
    fwd_offsets: Vec<u32>,
    fwd_targets: Vec<u32>,
    rev_offsets: Vec<u32>,
    rev_targets: Vec<u32>,
    scc_of: Vec<u32>,
    scc_members: Vec<Vec<u32>>,
    succ_offsets: Vec<u32>,
    succ_targets: Vec<u32>,
    pred_offsets: Vec<u32>,
    pred_targets: Vec<u32>,
    rev_topo: Vec<u32>,
    arc_weights: Vec<u64>,
    /// Cached metric results: kind key → name/value pairs.
    metrics: Vec<(String, Vec<(String, f64)>)>,
}

pub(crate) fn save(net: &PackageNetwork, path: &Path) -> Result<(), ModelError> {
    let graph = net.graph();
    let parts = net.condensation().clone().into_parts();
    let metrics: Vec<(String, Vec<(String, f64)>)> = net
        .cached_metrics()
        .into_iter()
        .map(|(key, stats)| {
            let pairs = stats.iter().map(|(n, v)| (n.to_string(), v)).collect();
            (key, pairs)
        })
        .collect();
    let body = ModelBody {
        names: graph.names().map(str::to_string).collect(),
        fwd_offsets: graph.fwd().offsets.clone(),
        fwd_targets: graph.fwd().targets.clone(),
        rev_offsets: graph.rev().offsets.clone(),
        rev_targets: graph.rev().targets.clone(),
        scc_of: parts.scc_of,
        scc_members: parts.members,
        succ_offsets: parts.succ.offsets,
        succ_targets: parts.succ.targets,
        pred_offsets: parts.pred.offsets,
        pred_targets: parts.pred.targets,
        rev_topo: parts.rev_topo,
        arc_weights: parts.arc_weights,
        metrics,
    };

    let file = File::create(path)?;
    let mut enc = GzEncoder::new(file, Compression::default());
    enc.write_all(&MAGIC)?;
    enc.write_all(&[FORMAT_VERSION])?;
    enc.write_all(&(body.names.len() as u64).to_le_bytes())?;
    enc.write_all(&(body.scc_members.len() as u64).to_le_bytes())?;
    bincode::serde::encode_into_std_write(&body, &mut enc, bincode::config::standard())
        .map_err(|e| ModelError::Io(io::Error::other(e)))?;
    enc.finish()?;
    debug!(path = %path.display(), "model saved");
    Ok(())
}

pub(crate) fn load(path: &Path) -> Result<PackageNetwork, ModelError> {
    let file = File::open(path)?;
    let mut dec = GzDecoder::new(file);

    let mut magic = [0u8; 4];
    dec.read_exact(&mut magic).map_err(read_failure)?;
    if magic != MAGIC {
        return Err(ModelError::CorruptedModel("bad magic".to_string()));
    }
    let mut version = [0u8; 1];
    dec.read_exact(&mut version).map_err(read_failure)?;
    if version[0] != FORMAT_VERSION {
        return Err(ModelError::CorruptedModel(format!(
            "unsupported format version {}",
            version[0]
        )));
    }
    let mut count = [0u8; 8];
    dec.read_exact(&mut count).map_err(read_failure)?;
    let n = u64::from_le_bytes(count);
    dec.read_exact(&mut count).map_err(read_failure)?;
    let c = u64::from_le_bytes(count);
    if n > u32::MAX as u64 || c > n {
        return Err(ModelError::CorruptedModel(format!(
            "implausible counts: {n} packages, {c} SCCs"
        )));
    }

    let mut payload = Vec::new();
    dec.read_to_end(&mut payload).map_err(read_failure)?;
    let (body, _): (ModelBody, usize) =
        bincode::serde::decode_from_slice(&payload, bincode::config::standard())
            .map_err(|e| ModelError::CorruptedModel(format!("undecodable body: {e}")))?;
    validate(&body, n as usize, c as usize)?;

    let graph = PackageGraph::from_parts(
        body.names,
        Csr {
            offsets: body.fwd_offsets,
            targets: body.fwd_targets,
        },
        Csr {
            offsets: body.rev_offsets,
            targets: body.rev_targets,
        },
    );
    let cond = Condensation::from_parts(
        CondensationParts {
            scc_of: body.scc_of,
            members: body.scc_members,
            succ: Csr {
                offsets: body.succ_offsets,
                targets: body.succ_targets,
            },
            pred: Csr {
                offsets: body.pred_offsets,
                targets: body.pred_targets,
            },
            rev_topo: body.rev_topo,
            arc_weights: body.arc_weights,
        },
        n as usize,
    )
    .map_err(|e| ModelError::CorruptedModel(e.to_string()))?;

    let cached = body
        .metrics
        .into_iter()
        .map(|(key, pairs)| (key, MetricStats::from_values(pairs)))
        .collect();
    debug!(path = %path.display(), packages = n, sccs = c, "model loaded");
    Ok(PackageNetwork::from_loaded(graph, cond, cached))
}

/// Header/body reads hitting a damaged stream (bad CRC, truncation) are
/// corruption; everything else is genuine I/O.
fn read_failure(e: io::Error) -> ModelError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            ModelError::CorruptedModel(e.to_string())
        }
        _ => ModelError::Io(e),
    }
}

fn validate(body: &ModelBody, n: usize, c: usize) -> Result<(), ModelError> {
    fn corrupt(reason: &str) -> ModelError {
        ModelError::CorruptedModel(reason.to_string())
    }
    fn check_csr(offsets: &[u32], targets: &[u32], nodes: usize, bound: usize) -> bool {
        offsets.len() == nodes + 1
            && offsets.first() == Some(&0)
            && offsets.windows(2).all(|w| w[0] <= w[1])
            && offsets.last().copied() == Some(targets.len() as u32)
            && targets.iter().all(|&t| (t as usize) < bound)
    }

    if body.names.len() != n {
        return Err(corrupt("name table length disagrees with header"));
    }
    let unique: HashSet<&str> = body.names.iter().map(String::as_str).collect();
    if unique.len() != n {
        return Err(corrupt("duplicate package names"));
    }
    if !check_csr(&body.fwd_offsets, &body.fwd_targets, n, n)
        || !check_csr(&body.rev_offsets, &body.rev_targets, n, n)
    {
        return Err(corrupt("malformed adjacency arrays"));
    }
    if body.fwd_targets.len() != body.rev_targets.len() {
        return Err(corrupt("forward and reverse arc counts disagree"));
    }
    if body.scc_members.len() != c {
        return Err(corrupt("SCC count disagrees with header"));
    }
    if !check_csr(&body.succ_offsets, &body.succ_targets, c, c)
        || !check_csr(&body.pred_offsets, &body.pred_targets, c, c)
    {
        return Err(corrupt("malformed condensation arrays"));
    }
    if body.scc_of.len() != n || body.scc_of.iter().any(|&s| (s as usize) >= c) {
        return Err(corrupt("malformed SCC membership map"));
    }
    if body.rev_topo.len() != c || body.arc_weights.len() != c {
        return Err(corrupt("malformed SCC aggregate arrays"));
    }
    Ok(())
}
