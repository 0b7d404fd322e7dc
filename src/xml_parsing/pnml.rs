//! Streaming parser for the 1-safe PNML subset.
//!
//! The parser accepts both namespaced and namespace-free documents by
//! matching elements on their local names. It rejects anything that
//! breaks the 1-safe reading of the net: an initial token count above one
//! or an arc weight other than one.

use crate::error::AnalysisError;
use crate::petri_net::PetriNet;
use crate::xml_parsing::utils::find_start_of;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

/// The PNML node currently being assembled.
enum Draft {
    Place {
        id: String,
        name: Option<String>,
        tokens: String,
    },
    Transition {
        id: String,
        name: Option<String>,
    },
    Arc {
        source: String,
        target: String,
        weight: String,
    },
}

pub fn parse_file(path: impl AsRef<Path>) -> Result<PetriNet, AnalysisError> {
    let file = File::open(path)?;
    parse(BufReader::new(file))
}

/// Parse a PNML document into the net data model.
pub fn parse<R: Read>(input: R) -> Result<PetriNet, AnalysisError> {
    let mut xml = EventReader::new(input);
    find_start_of(&mut xml, "net")?;

    let mut places: Vec<(String, bool, Option<String>)> = Vec::new();
    let mut transitions: Vec<(String, Option<String>)> = Vec::new();
    let mut arcs: Vec<(String, String)> = Vec::new();

    let mut path: Vec<String> = Vec::new();
    let mut draft: Option<Draft> = None;

    loop {
        match xml.next() {
            Ok(XmlEvent::StartElement {
                name, attributes, ..
            }) => {
                match name.local_name.as_str() {
                    "place" => {
                        draft = Some(Draft::Place {
                            id: required_attribute(&attributes, "id", "place")?,
                            name: None,
                            tokens: String::new(),
                        });
                    }
                    "transition" => {
                        draft = Some(Draft::Transition {
                            id: required_attribute(&attributes, "id", "transition")?,
                            name: None,
                        });
                    }
                    "arc" => {
                        draft = Some(Draft::Arc {
                            source: required_attribute(&attributes, "source", "arc")?,
                            target: required_attribute(&attributes, "target", "arc")?,
                            weight: String::new(),
                        });
                    }
                    _ => {}
                }
                path.push(name.local_name);
            }
            Ok(XmlEvent::Characters(text)) => {
                collect_text(&mut draft, &path, &text);
            }
            Ok(XmlEvent::EndElement { name }) => {
                match name.local_name.as_str() {
                    "place" => {
                        if let Some(Draft::Place { id, name, tokens }) = draft.take() {
                            places.push((id, parse_token_count(&tokens)?, name));
                        }
                    }
                    "transition" => {
                        if let Some(Draft::Transition { id, name }) = draft.take() {
                            transitions.push((id, name));
                        }
                    }
                    "arc" => {
                        if let Some(Draft::Arc {
                            source,
                            target,
                            weight,
                        }) = draft.take()
                        {
                            check_arc_weight(&source, &target, &weight)?;
                            arcs.push((source, target));
                        }
                    }
                    "net" => break,
                    _ => {}
                }
                path.pop();
            }
            Ok(XmlEvent::EndDocument) => break,
            Ok(_) => {}
            Err(error) => {
                return Err(AnalysisError::InvalidNet(format!(
                    "malformed XML: {error}"
                )));
            }
        }
    }

    let mut net = PetriNet::new();
    for (id, has_token, name) in &places {
        net.add_place(id, *has_token, name.as_deref())?;
    }
    for (id, name) in &transitions {
        net.add_transition(id, name.as_deref())?;
    }
    for (source, target) in &arcs {
        net.add_arc(source, target)?;
    }

    let issues = net.validate();
    if !issues.is_empty() {
        return Err(AnalysisError::InvalidNet(issues.join("; ")));
    }
    Ok(net)
}

fn required_attribute(
    attributes: &[OwnedAttribute],
    key: &str,
    element: &str,
) -> Result<String, AnalysisError> {
    attributes
        .iter()
        .find(|attribute| attribute.name.local_name == key)
        .map(|attribute| attribute.value.clone())
        .ok_or_else(|| {
            AnalysisError::InvalidNet(format!("`{element}` element without `{key}` attribute"))
        })
}

/// Route character data into the draft field selected by the open-element
/// path.
fn collect_text(draft: &mut Option<Draft>, path: &[String], text: &str) {
    let target = match draft {
        Some(Draft::Place { name, tokens, .. }) => {
            if path_ends(path, &["name", "text"]) {
                name.get_or_insert_with(String::new)
            } else if path_ends(path, &["initialMarking", "text"]) {
                tokens
            } else {
                return;
            }
        }
        Some(Draft::Transition { name, .. }) => {
            if path_ends(path, &["name", "text"]) {
                name.get_or_insert_with(String::new)
            } else {
                return;
            }
        }
        Some(Draft::Arc { weight, .. }) => {
            if path_ends(path, &["inscription", "text"]) {
                weight
            } else {
                return;
            }
        }
        None => return,
    };
    target.push_str(text);
}

fn path_ends(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(have, want)| have == want)
}

/// An absent or unparsable count reads as zero tokens; a count above one
/// breaks 1-safety and is rejected.
fn parse_token_count(text: &str) -> Result<bool, AnalysisError> {
    let count = text.trim().parse::<u64>().unwrap_or(0);
    if count > 1 {
        return Err(AnalysisError::InvalidNet(format!(
            "initial token count {count} is not 1-safe"
        )));
    }
    Ok(count == 1)
}

/// An absent or unparsable inscription reads as weight one; any other
/// weight is rejected.
fn check_arc_weight(source: &str, target: &str, text: &str) -> Result<(), AnalysisError> {
    let weight = text.trim().parse::<u64>().unwrap_or(1);
    if weight != 1 {
        return Err(AnalysisError::InvalidNet(format!(
            "arc from `{source}` to `{target}` has weight {weight}; all arc weights must be 1"
        )));
    }
    Ok(())
}
