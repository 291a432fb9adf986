//! Backend-agnostic shader graph model
//!
//! A [`ShaderGraph`] is the structured description handed to the
//! serialization backend: typed nodes, typed attribute values and directed
//! connections. Connections are stored on the consuming input, so an edge
//! can never exist without the input it feeds.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Backend;
use crate::material::AssetRef;

/// Graph structure errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two nodes with the same id
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// Reference to a node that is not in the graph
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Reference to an output port the node does not declare
    #[error("Node {node} has no output port {port}")]
    UnknownPort {
        /// Node id
        node: String,
        /// Missing port
        port: String,
    },

    /// Connection whose endpoints are not both in the graph
    #[error("Dangling connection from {from} to {to}")]
    DanglingConnection {
        /// Source endpoint
        from: String,
        /// Destination endpoint
        to: String,
    },

    /// Node whose output feeds back into its own input
    #[error("Cycle through node {0}")]
    Cycle(String),
}

/// Scene-description value types used by shader inputs and outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// `float`
    Float,
    /// `float2`
    Float2,
    /// `float3`
    Float3,
    /// `float4`
    Float4,
    /// `color3f`
    Color3,
    /// `vector3f`
    Vector3,
    /// `int`
    Int,
    /// `bool`
    Bool,
    /// `token`
    Token,
    /// `string`
    String,
    /// `asset`
    Asset,
}

impl ValueType {
    /// Scene-description type name
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Float2 => "float2",
            Self::Float3 => "float3",
            Self::Float4 => "float4",
            Self::Color3 => "color3f",
            Self::Vector3 => "vector3f",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Token => "token",
            Self::String => "string",
            Self::Asset => "asset",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Scalar
    Float(f32),
    /// Pair
    Float2([f32; 2]),
    /// Triple
    Float3([f32; 3]),
    /// Quad
    Float4([f32; 4]),
    /// RGB color
    Color3([f32; 3]),
    /// Integer
    Int(i32),
    /// Boolean
    Bool(bool),
    /// Token
    Token(String),
    /// Free string
    String(String),
    /// Texture file, resolved through the relocation map
    Asset(AssetRef),
}

impl AttributeValue {
    /// Type of the value
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Float(_) => ValueType::Float,
            Self::Float2(_) => ValueType::Float2,
            Self::Float3(_) => ValueType::Float3,
            Self::Float4(_) => ValueType::Float4,
            Self::Color3(_) => ValueType::Color3,
            Self::Int(_) => ValueType::Int,
            Self::Bool(_) => ValueType::Bool,
            Self::Token(_) => ValueType::Token,
            Self::String(_) => ValueType::String,
            Self::Asset(_) => ValueType::Asset,
        }
    }

    /// Token value helper
    pub fn token(value: &str) -> Self {
        Self::Token(value.to_string())
    }
}

/// One side of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Node id within the graph
    pub node: String,
    /// Port name on that node
    pub port: String,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// Value of a node input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeInput {
    /// Authored value
    Value(AttributeValue),
    /// Driven by another node's output
    Connected {
        /// Upstream output
        source: Endpoint,
        /// Type the input is declared with
        value_type: ValueType,
    },
}

/// Directed edge `(source node, port) -> (destination node, port)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Upstream node id
    pub source_node: String,
    /// Upstream output port
    pub source_port: String,
    /// Downstream node id
    pub dest_node: String,
    /// Downstream input name
    pub dest_port: String,
}

/// Shader node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderNode {
    /// Id, unique within the graph
    pub id: String,
    /// Backend shader identifier, e.g. `ND_image_color3`
    pub kind: String,
    /// Inputs in authoring order
    pub attributes: IndexMap<String, NodeInput>,
    /// Declared output ports
    pub outputs: IndexSet<String>,
}

impl ShaderNode {
    /// Create a node with the given output ports
    pub fn new(id: impl Into<String>, kind: impl Into<String>, outputs: &[&str]) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            attributes: IndexMap::new(),
            outputs: outputs.iter().map(|port| (*port).to_string()).collect(),
        }
    }

    /// Builder-style attribute value
    pub fn with_value(mut self, name: &str, value: AttributeValue) -> Self {
        self.set_value(name, value);
        self
    }

    /// Author a value, replacing any value or connection on that input
    pub fn set_value(&mut self, name: &str, value: AttributeValue) {
        self.attributes.insert(name.to_string(), NodeInput::Value(value));
    }

    /// Authored value of an input, if it is not connected
    pub fn value(&self, name: &str) -> Option<&AttributeValue> {
        match self.attributes.get(name) {
            Some(NodeInput::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Upstream endpoint of an input, if it is connected
    pub fn source(&self, name: &str) -> Option<&Endpoint> {
        match self.attributes.get(name) {
            Some(NodeInput::Connected { source, .. }) => Some(source),
            _ => None,
        }
    }
}

/// Graph-level output port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphOutput {
    /// Node output feeding the port
    pub source: Endpoint,
    /// Declared type
    pub value_type: ValueType,
}

/// Graph output carrying the shaded surface
pub const SURFACE_OUTPUT: &str = "surface";
/// Graph output carrying displacement, when a backend exposes one
pub const DISPLACEMENT_OUTPUT: &str = "displacement";

/// Shader network for one material and one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderGraph {
    /// Backend the network targets
    pub backend: Backend,
    /// Material the network belongs to
    pub material: String,
    nodes: IndexMap<String, ShaderNode>,
    outputs: IndexMap<String, GraphOutput>,
}

impl ShaderGraph {
    /// Create an empty graph
    pub fn new(backend: Backend, material: impl Into<String>) -> Self {
        Self {
            backend,
            material: material.into(),
            nodes: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Prim name of the node graph under the material
    pub const fn name(&self) -> &'static str {
        self.backend.node_graph_name()
    }

    /// Material-qualified id of a node, stable across runs
    pub fn qualified_id(&self, node: &str) -> String {
        format!("{}/{}/{}", self.material, self.name(), node)
    }

    /// Add a node
    pub fn add_node(&mut self, node: ShaderNode) -> Result<&mut ShaderNode, GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let entry = self.nodes.entry(id).or_insert(node);
        Ok(entry)
    }

    /// Add a node unless one with the same id exists; returns the stored node
    pub fn add_shared_node(&mut self, node: ShaderNode) -> &mut ShaderNode {
        self.nodes.entry(node.id.clone()).or_insert(node)
    }

    /// Node by id
    pub fn node(&self, id: &str) -> Option<&ShaderNode> {
        self.nodes.get(id)
    }

    /// Mutable node by id
    pub fn node_mut(&mut self, id: &str) -> Option<&mut ShaderNode> {
        self.nodes.get_mut(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &ShaderNode> {
        self.nodes.values()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes of a given kind
    pub fn nodes_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a ShaderNode> + 'a {
        self.nodes.values().filter(move |node| node.kind == kind)
    }

    /// Author a value on a node input
    pub fn set_value(&mut self, node: &str, input: &str, value: AttributeValue) -> Result<(), GraphError> {
        self.node_mut(node)
            .ok_or_else(|| GraphError::UnknownNode(node.to_string()))?
            .set_value(input, value);
        Ok(())
    }

    /// Connect `source.port` into `dest.input`
    ///
    /// Both nodes must exist and the source must declare the port.
    pub fn connect(
        &mut self,
        source: &str,
        port: &str,
        dest: &str,
        input: &str,
        value_type: ValueType,
    ) -> Result<(), GraphError> {
        self.check_source(source, port)?;
        if source == dest {
            return Err(GraphError::Cycle(source.to_string()));
        }
        let node = self
            .nodes
            .get_mut(dest)
            .ok_or_else(|| GraphError::UnknownNode(dest.to_string()))?;
        node.attributes.insert(
            input.to_string(),
            NodeInput::Connected {
                source: Endpoint::new(source, port),
                value_type,
            },
        );
        Ok(())
    }

    /// Expose `source.port` as a graph-level output
    pub fn set_output(
        &mut self,
        name: &str,
        source: &str,
        port: &str,
        value_type: ValueType,
    ) -> Result<(), GraphError> {
        self.check_source(source, port)?;
        self.outputs.insert(
            name.to_string(),
            GraphOutput {
                source: Endpoint::new(source, port),
                value_type,
            },
        );
        Ok(())
    }

    /// Graph-level outputs
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &GraphOutput)> {
        self.outputs.iter().map(|(name, output)| (name.as_str(), output))
    }

    /// Graph-level output by name
    pub fn output(&self, name: &str) -> Option<&GraphOutput> {
        self.outputs.get(name)
    }

    /// All edges, in node then input order
    pub fn connections(&self) -> Vec<Connection> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.attributes.iter().filter_map(move |(input, value)| match value {
                    NodeInput::Connected { source, .. } => Some(Connection {
                        source_node: source.node.clone(),
                        source_port: source.port.clone(),
                        dest_node: node.id.clone(),
                        dest_port: input.clone(),
                    }),
                    NodeInput::Value(_) => None,
                })
            })
            .collect()
    }

    /// Texture references authored on any node
    pub fn assets(&self) -> impl Iterator<Item = &AssetRef> {
        self.nodes.values().flat_map(|node| {
            node.attributes.values().filter_map(|input| match input {
                NodeInput::Value(AttributeValue::Asset(asset)) => Some(asset),
                _ => None,
            })
        })
    }

    /// Mutable texture references, for path resolution
    pub fn assets_mut(&mut self) -> impl Iterator<Item = &mut AssetRef> {
        self.nodes.values_mut().flat_map(|node| {
            node.attributes.values_mut().filter_map(|input| match input {
                NodeInput::Value(AttributeValue::Asset(asset)) => Some(asset),
                _ => None,
            })
        })
    }

    /// Check every edge lands on existing nodes and ports and the graph is a DAG
    pub fn validate(&self) -> Result<(), GraphError> {
        for connection in self.connections() {
            let source_ok = self
                .nodes
                .get(&connection.source_node)
                .is_some_and(|node| node.outputs.contains(&connection.source_port));
            if !source_ok {
                return Err(GraphError::DanglingConnection {
                    from: format!("{}.{}", connection.source_node, connection.source_port),
                    to: format!("{}.{}", connection.dest_node, connection.dest_port),
                });
            }
        }
        for (name, output) in &self.outputs {
            self.check_source(&output.source.node, &output.source.port)
                .map_err(|_| GraphError::DanglingConnection {
                    from: output.source.to_string(),
                    to: format!("<graph>.{name}"),
                })?;
        }
        self.topological_order().map(|_| ())
    }

    /// Node ids ordered so every source precedes its consumers
    ///
    /// Ties keep insertion order, so the order is deterministic.
    pub fn topological_order(&self) -> Result<Vec<&str>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = self.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        let mut consumers: HashMap<&str, Vec<&str>> = HashMap::new();

        for node in self.nodes.values() {
            let upstream: IndexSet<&str> = node
                .attributes
                .values()
                .filter_map(|input| match input {
                    NodeInput::Connected { source, .. } => Some(source.node.as_str()),
                    NodeInput::Value(_) => None,
                })
                .collect();
            for source in upstream {
                if let Some(degree) = in_degree.get_mut(node.id.as_str()) {
                    *degree += 1;
                }
                consumers.entry(source).or_default().push(node.id.as_str());
            }
        }

        let mut ready: VecDeque<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            for consumer in consumers.get(id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(consumer) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*consumer);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            return Ok(order);
        }
        let stuck = self
            .nodes
            .keys()
            .find(|id| in_degree.get(id.as_str()).is_some_and(|degree| *degree > 0))
            .cloned()
            .unwrap_or_default();
        Err(GraphError::Cycle(stuck))
    }

    fn check_source(&self, source: &str, port: &str) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get(source)
            .ok_or_else(|| GraphError::UnknownNode(source.to_string()))?;
        if node.outputs.contains(port) {
            Ok(())
        } else {
            Err(GraphError::UnknownPort {
                node: source.to_string(),
                port: port.to_string(),
            })
        }
    }
}
