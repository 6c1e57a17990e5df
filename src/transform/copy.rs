use crate::error::TransformError;
use crate::io::copy_file;
use crate::transform::{Route, Transform};

/// Copies files verbatim, used for images and fonts.
pub struct CopyTransform {
    pub route: Route,
}

impl Transform for CopyTransform {
    fn run(&self) -> Result<(), TransformError> {
        self.route
            .for_each(|source| copy_file(&source.path, &self.route.output(&source.relative)))?;

        Ok(())
    }
}
