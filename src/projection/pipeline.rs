use std::fmt;

use crate::error::{Error, Result};
use crate::projection::descriptor::CrsDescriptor;

/// Head operator of every PROJ pipeline definition
const PIPELINE_HEAD: &str = "proj=pipeline";

/// One operation in a transformation pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Operator and its parameters, without `+` prefixes (e.g. `proj=webmerc ellps=WGS84`)
    pub operation: String,
    /// Whether the step runs in its inverse direction
    pub inverse: bool,
}

impl Step {
    /// A step running forward
    pub fn forward(operation: &str) -> Self {
        Self {
            operation: operation.trim().to_string(),
            inverse: false,
        }
    }

    /// A step running in its inverse direction
    pub fn inverse(operation: &str) -> Self {
        Self {
            operation: operation.trim().to_string(),
            inverse: true,
        }
    }

    /// Builds the step contributed by a compound component
    ///
    /// Affine components and PROJ strings are used verbatim; a bare name is a
    /// vertical shift grid. EPSG codes and WKT cannot be expressed as a
    /// single pipeline step.
    pub fn from_component(component: &CrsDescriptor, inverse: bool) -> Result<Self> {
        let operation = match component {
            CrsDescriptor::Affine(text) => text.clone(),
            CrsDescriptor::Text(text) if text.contains('[') => {
                return Err(Error::Descriptor(
                    "WKT definitions cannot be used as pipeline components".to_string(),
                ))
            }
            CrsDescriptor::Text(text) if text.contains("proj=") => text
                .split_whitespace()
                .map(|token| token.trim_start_matches('+'))
                .collect::<Vec<_>>()
                .join(" "),
            CrsDescriptor::Text(grid) => format!("proj=vgridshift grids={} multiplier=1", grid.trim()),
            other => {
                return Err(Error::Descriptor(format!(
                    "{} cannot be used as a pipeline component",
                    other
                )))
            }
        };

        Ok(Self {
            operation,
            inverse,
        })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+step")?;
        if self.inverse {
            write!(f, " +inv")?;
        }
        for token in self.operation.split_whitespace() {
            write!(f, " +{}", token)?;
        }
        Ok(())
    }
}

/// An ordered PROJ step pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    globals: Vec<String>,
    steps: Vec<Step>,
}

impl Pipeline {
    /// Creates an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a PROJ operation definition into steps
    ///
    /// A pipeline definition yields one step per `step` keyword, any other
    /// `proj=` operation becomes a single forward step.
    pub fn parse(definition: &str) -> Result<Self> {
        let tokens: Vec<&str> = definition
            .split_whitespace()
            .map(|token| token.trim_start_matches('+'))
            .filter(|token| !token.is_empty())
            .collect();

        if tokens.is_empty() {
            return Err(Error::Projection("empty operation definition".to_string()));
        }

        if !tokens[0].starts_with("proj=") {
            return Err(Error::Projection(format!(
                "not a PROJ operation definition: {}",
                definition.trim()
            )));
        }

        let mut pipeline = Pipeline::new();
        if tokens[0] != PIPELINE_HEAD {
            pipeline.steps.push(Step::forward(&tokens.join(" ")));
            return Ok(pipeline);
        }

        let mut current: Option<(bool, Vec<&str>)> = None;
        for &token in &tokens[1..] {
            if token == "step" {
                if let Some((inverse, ops)) = current.take() {
                    pipeline.push_tokens(inverse, &ops);
                }
                current = Some((false, Vec::new()));
                continue;
            }
            match current.as_mut() {
                Some((inverse, ops)) => {
                    if token == "inv" && ops.is_empty() {
                        *inverse = true;
                    } else {
                        ops.push(token);
                    }
                }
                None => pipeline.globals.push(token.to_string()),
            }
        }
        if let Some((inverse, ops)) = current {
            pipeline.push_tokens(inverse, &ops);
        }

        Ok(pipeline)
    }

    fn push_tokens(&mut self, inverse: bool, tokens: &[&str]) {
        if tokens.is_empty() {
            return;
        }
        self.steps.push(Step {
            operation: tokens.join(" "),
            inverse,
        });
    }

    /// Inserts a step at the front, ahead of every existing step
    ///
    /// Repeated calls stack in reverse: the last step inserted runs first.
    pub fn insert_front(&mut self, step: Step) {
        self.steps.insert(0, step);
    }

    /// Appends a step at the end
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns whether the pipeline has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Full `+proj=pipeline` definition
    pub fn definition(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", PIPELINE_HEAD)?;
        for global in &self.globals {
            write!(f, " +{}", global)?;
        }
        for step in &self.steps {
            write!(f, " {}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBMERC: &str = "proj=pipeline step proj=axisswap order=2,1 step proj=unitconvert xy_in=deg xy_out=rad step proj=webmerc lat_0=0 lon_0=0 x_0=0 y_0=0 ellps=WGS84";

    #[test]
    fn test_parse_pipeline() {
        let pipeline = Pipeline::parse(WEBMERC).unwrap();
        assert_eq!(pipeline.steps().len(), 3);
        assert_eq!(pipeline.steps()[0], Step::forward("proj=axisswap order=2,1"));
        assert!(pipeline.steps()[2].operation.starts_with("proj=webmerc"));
    }

    #[test]
    fn test_parse_inverse_and_plus_prefixes() {
        let pipeline = Pipeline::parse("+proj=pipeline +ellps=GRS80 +step +inv +proj=utm +zone=23 +south").unwrap();
        assert_eq!(pipeline.steps(), &[Step::inverse("proj=utm zone=23 south")]);
        assert_eq!(
            pipeline.definition(),
            "+proj=pipeline +ellps=GRS80 +step +inv +proj=utm +zone=23 +south"
        );
    }

    #[test]
    fn test_parse_single_operation() {
        let pipeline = Pipeline::parse("proj=noop").unwrap();
        assert_eq!(pipeline.steps(), &[Step::forward("proj=noop")]);
    }

    #[test]
    fn test_parse_empty_definition() {
        assert!(Pipeline::parse("  ").is_err());
    }

    #[test]
    fn test_parse_rejects_deferred_definition() {
        let err = Pipeline::parse("unavailable until proj_trans is called").unwrap_err();
        assert!(matches!(err, Error::Projection(_)));
    }

    #[test]
    fn test_insert_front_is_reverse_stable() {
        let mut pipeline = Pipeline::parse(WEBMERC).unwrap();
        pipeline.insert_front(Step::inverse("proj=vgridshift grids=a.gtx"));
        pipeline.insert_front(Step::inverse("proj=vgridshift grids=b.gtx"));

        let steps = pipeline.steps();
        assert_eq!(steps[0].operation, "proj=vgridshift grids=b.gtx");
        assert_eq!(steps[1].operation, "proj=vgridshift grids=a.gtx");
        assert_eq!(steps[2].operation, "proj=axisswap order=2,1");
    }

    #[test]
    fn test_step_from_component() {
        let grid = Step::from_component(&CrsDescriptor::Text("geoidgrid".into()), true).unwrap();
        assert_eq!(grid.to_string(), "+step +inv +proj=vgridshift +grids=geoidgrid +multiplier=1");

        let affine = CrsDescriptor::Affine("proj=affine xoff=10".into());
        assert_eq!(Step::from_component(&affine, false).unwrap().operation, "proj=affine xoff=10");

        let epsg = CrsDescriptor::Epsg("epsg:5773".into());
        assert!(Step::from_component(&epsg, false).is_err());
    }
}
