use crate::error::AnalysisError;
use std::io::Read;
use xml::reader::{EventReader, XmlEvent};

/// Advance the reader until just past the opening tag of the named
/// element. Namespace prefixes are ignored; elements are matched by their
/// local name.
pub fn find_start_of<R: Read>(
    xml: &mut EventReader<R>,
    element: &str,
) -> Result<(), AnalysisError> {
    loop {
        match xml.next() {
            Ok(XmlEvent::StartElement { name, .. }) if name.local_name == element => {
                return Ok(());
            }
            Ok(XmlEvent::EndDocument) => {
                return Err(AnalysisError::InvalidNet(format!(
                    "expected element `{element}`, but the document ended"
                )));
            }
            Ok(_) => {}
            Err(error) => {
                return Err(AnalysisError::InvalidNet(format!(
                    "malformed XML: {error}"
                )));
            }
        }
    }
}
