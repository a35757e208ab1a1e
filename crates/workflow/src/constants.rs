//! Well-known node type names the graph treats specially.

pub const MANUAL_TRIGGER_NODE_TYPE: &str = "n8n-nodes-base.manualTrigger";
pub const EXECUTE_WORKFLOW_TRIGGER_NODE_TYPE: &str = "n8n-nodes-base.executeWorkflowTrigger";
pub const ERROR_TRIGGER_NODE_TYPE: &str = "n8n-nodes-base.errorTrigger";
pub const START_NODE_TYPE: &str = "n8n-nodes-base.start";
pub const EVALUATION_TRIGGER_NODE_TYPE: &str = "n8n-nodes-base.evaluationTrigger";

/// Chat trigger that must never be picked as a run's start node.
pub const MANUAL_CHAT_TRIGGER_NODE_TYPE: &str = "@n8n/n8n-nodes-langchain.manualChatTrigger";

/// Fallback start types, highest priority first.
pub const STARTING_NODE_TYPES: &[&str] = &[
    MANUAL_TRIGGER_NODE_TYPE,
    EXECUTE_WORKFLOW_TRIGGER_NODE_TYPE,
    ERROR_TRIGGER_NODE_TYPE,
    START_NODE_TYPE,
    EVALUATION_TRIGGER_NODE_TYPE,
];

/// Names that collide with object-model members when the tables are
/// serialised back into plain JSON objects. Compared case-insensitively.
pub const RESERVED_NODE_NAMES: &[&str] = &[
    "__proto__",
    "constructor",
    "prototype",
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "toString",
    "toLocaleString",
    "valueOf",
    "__defineGetter__",
    "__defineSetter__",
    "__lookupGetter__",
    "__lookupSetter__",
];
