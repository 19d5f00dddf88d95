//! BLAST XML (`-outfmt 5` / `FORMAT_TYPE=XML`) reader
//!
//! Only the fields the hit filter needs are read: per HSP the subject
//! accession, e-value, identities, alignment length and aligned subject.

use super::filter::RawHit;
use crate::accession;
use crate::error::AdapterError;
use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Default)]
struct HspFields {
    e_value: Option<f64>,
    identities: Option<f64>,
    align_len: Option<f64>,
    hseq: String,
}

/// Parse every HSP of every hit, in document order
pub fn parse_blast_xml(xml: &str) -> Result<Vec<RawHit>, AdapterError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut hits = Vec::new();
    let mut current_tag: Option<String> = None;
    let mut hit_id = String::new();
    let mut hit_accession = String::new();
    let mut hsp = HspFields::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "Hit" => {
                        hit_id.clear();
                        hit_accession.clear();
                    },
                    "Hsp" => hsp = HspFields::default(),
                    _ => {},
                }
                current_tag = Some(name);
            },
            Event::Text(t) => {
                let Some(tag) = current_tag.as_deref() else {
                    continue;
                };
                let text = t.unescape()?;
                match tag {
                    "Hit_id" => hit_id = text.trim().to_string(),
                    "Hit_accession" => hit_accession = text.trim().to_string(),
                    "Hsp_evalue" => hsp.e_value = Some(parse_number(tag, &text)?),
                    "Hsp_identity" => hsp.identities = Some(parse_number(tag, &text)?),
                    "Hsp_align-len" => hsp.align_len = Some(parse_number(tag, &text)?),
                    "Hsp_hseq" => hsp.hseq = text.trim().to_string(),
                    _ => {},
                }
            },
            Event::End(e) => {
                if e.name().as_ref() == b"Hsp" {
                    let fields = std::mem::take(&mut hsp);
                    if let Some(hit) = finish_hsp(&hit_id, &hit_accession, fields)? {
                        hits.push(hit);
                    }
                }
                current_tag = None;
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(hits)
}

fn parse_number(tag: &str, text: &str) -> Result<f64, AdapterError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| AdapterError::Malformed(format!("{} is not a number: '{}'", tag, text.trim())))
}

fn finish_hsp(
    hit_id: &str,
    hit_accession: &str,
    fields: HspFields,
) -> Result<Option<RawHit>, AdapterError> {
    let id = accession::normalize(hit_accession).or_else(|| accession::normalize(hit_id));
    let Some(id) = id else {
        tracing::debug!(hit_id, hit_accession, "Skipping hit with unrecognized accession");
        return Ok(None);
    };

    let (Some(e_value), Some(identities), Some(align_len)) =
        (fields.e_value, fields.identities, fields.align_len)
    else {
        return Err(AdapterError::Malformed(format!("incomplete HSP for hit '{}'", id)));
    };

    let identity_pct = if align_len > 0.0 {
        identities / align_len * 100.0
    } else {
        0.0
    };

    Ok(Some(RawHit {
        id,
        subject_seq: fields.hseq,
        identity_pct,
        e_value,
    }))
}
