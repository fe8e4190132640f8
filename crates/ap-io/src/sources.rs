use std::fmt;
use std::sync::Arc;

use crate::container::{ContainerSource, JsonContainers};
use crate::table::{TableSource, TextTables};

/// The readers a loader pulls artifacts through.
#[derive(Clone)]
pub struct DataSources {
    pub tables: Arc<dyn TableSource>,
    pub containers: Arc<dyn ContainerSource>,
}

impl DataSources {
    pub fn new(tables: Arc<dyn TableSource>, containers: Arc<dyn ContainerSource>) -> Self {
        Self { tables, containers }
    }
}

impl Default for DataSources {
    fn default() -> Self {
        Self::new(Arc::new(TextTables), Arc::new(JsonContainers))
    }
}

impl fmt::Debug for DataSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSources")
            .field("container_extension", &self.containers.extension())
            .finish_non_exhaustive()
    }
}
