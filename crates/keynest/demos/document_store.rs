// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Document Store Example
//!
//! Caches workspace documents under a two-level group tree and shows how one
//! invalidation retires every cached document of a single workspace.

use keynest::{CompositeKey, Config, InMemoryStore, Registry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Document {
    title: String,
    revision: u32,
}

/// Stands in for a slow database query.
async fn load_document(workspace: u32, document: u32) -> Document {
    Document {
        title: format!("doc {document} of workspace {workspace}"),
        revision: 1,
    }
}

fn main() -> Result<(), keynest::Error> {
    futures::executor::block_on(async {
        let registry = Registry::new();
        registry.configure(Config::builder(InMemoryStore::new()).logs(true).build())?;

        let workspaces = registry.register_group("workspaces", "workspace_id")?;
        let documents = workspaces.register_child_group("documents", "document_id")?;
        let bodies = documents.register_cache::<Document>("body")?;

        let mut keys: Vec<CompositeKey> = Vec::new();
        for document in 1..=3 {
            let key = documents.key([7, document])?;
            let doc = bodies.fetch(&key, || load_document(7, document)).await?;
            println!("{} -> {} (rev {})", bodies.path(&key).await?, doc.title, doc.revision);
            keys.push(key);
        }

        // One increment retires every document of workspace 7.
        let version = documents.invalidate_cache_group(Some(&keys[0])).await?;
        println!("documents of workspace 7 now at version {version}");

        let cached = bodies.read_multi(&keys).await?;
        println!("cached after invalidation: {}", cached.len());

        Ok(())
    })
}
