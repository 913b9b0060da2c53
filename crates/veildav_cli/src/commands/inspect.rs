//! Inspect command implementation.
//!
//! Prints the server's view of every collection. Everything shown here is
//! what a server operator could read.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use veildav_remote::MemoryServer;

/// Longest field value printed in text output.
const TEXT_VALUE_LIMIT: usize = 48;

/// Server inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Server file.
    pub path: String,
    /// Every collection.
    pub collections: Vec<CollectionView>,
}

/// One collection as stored.
#[derive(Debug, Serialize)]
pub struct CollectionView {
    /// Collection path.
    pub path: String,
    /// Collection properties, CTag included.
    pub properties: BTreeMap<String, String>,
    /// Stored records.
    pub members: Vec<MemberView>,
}

/// One stored record.
#[derive(Debug, Serialize)]
pub struct MemberView {
    /// Record UID.
    pub uid: String,
    /// Current ETag.
    pub etag: String,
    /// Fields as stored.
    pub fields: BTreeMap<String, String>,
    /// Attachment MIME type and size, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<(String, usize)>,
}

/// Collects what the server at `path` stores.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No server file found at {:?}", path).into());
    }
    let server = MemoryServer::open_file(path)?;

    let collections = server
        .paths()
        .into_iter()
        .map(|collection| {
            let members = server
                .members(&collection)
                .into_iter()
                .map(|(exposed, etag)| MemberView {
                    uid: exposed.uid,
                    etag: etag.as_str().to_string(),
                    fields: exposed.fields,
                    attachment: exposed
                        .attachment
                        .map(|a| (a.mime_type, a.data.len())),
                })
                .collect();
            CollectionView {
                properties: server.properties(&collection).unwrap_or_default(),
                members,
                path: collection,
            }
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        collections,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

fn shorten(value: &str) -> String {
    if value.chars().count() <= TEXT_VALUE_LIMIT {
        return value.to_string();
    }
    let head: String = value.chars().take(TEXT_VALUE_LIMIT).collect();
    format!("{head}…")
}

fn print_text_output(result: &InspectResult) {
    println!("Server: {}", result.path);
    println!("Collections: {}", result.collections.len());
    for collection in &result.collections {
        println!();
        println!("{} ({} records)", collection.path, collection.members.len());
        for (name, value) in &collection.properties {
            println!("  @{name} = {}", shorten(value));
        }
        for member in &collection.members {
            println!("  {} {}", member.uid, member.etag);
            for (name, value) in &member.fields {
                println!("    {name}: {}", shorten(value));
            }
            if let Some((mime, len)) = &member.attachment {
                println!("    [attachment {mime}, {len} bytes]");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use veildav_core::Contact;
    use veildav_crypto::{AesGcmCipher, MasterKey};
    use veildav_remote::{HidingCollection, RemoteCollection, ServerCollection};

    #[test]
    fn server_view_holds_no_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("server.json");
        {
            let server = MemoryServer::open_file(&file).unwrap();
            let mut collection: HidingCollection<Contact, ServerCollection> = HidingCollection::new(
                server.open("contacts/default"),
                Arc::new(AesGcmCipher::new(&MasterKey::generate())),
            );
            collection.ensure_collection("Family").unwrap();
            let mut contact = Contact::new("Ada Lovelace").with_field("EMAIL", "ada@example.org");
            contact.uid = Some("u1".into());
            collection.add_hidden_component(&contact).unwrap();
            collection.close().unwrap();
        }

        let result = inspect(&file).unwrap();
        assert_eq!(result.collections.len(), 1);
        assert_eq!(result.collections[0].members[0].uid, "u1");

        let dump = serde_json::to_string(&result).unwrap();
        assert!(!dump.contains("Ada Lovelace"));
        assert!(!dump.contains("ada@example.org"));
        assert!(!dump.contains("Family"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(inspect(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn long_values_are_shortened() {
        assert_eq!(shorten("short"), "short");
        assert_eq!(shorten(&"x".repeat(100)).chars().count(), TEXT_VALUE_LIMIT + 1);
    }
}
