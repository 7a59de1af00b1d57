/// Wiring rules for the rule canvas, shared by MCP instructions and tool docs.
pub const RULES: &str = "\
1. Data flows toward the result node. Every edge points from an argument to the operator that \
consumes it, and the root of the rule points into the single `result` node.\n\
2. The result node takes exactly one input and has no outputs. A canvas with nothing wired into \
`result` is the empty rule `{}`.\n\
3. Variables, constants and start nodes are leaves. Nothing can be connected into them.\n\
4. Argument order is the slot number on each edge. A new connection takes the lowest free slot, \
so deleting the first input of `-` and connecting a new node puts the new node first again.\n\
5. Operator arity comes from the symbol: `!` and `!!` take 1 input, `if` and `?:` take 3, \
`and`, `or` and `+` take any number, every other operator takes 2. Connections beyond the \
arity are refused.\n\
6. Changing an operator symbol to one with a smaller arity disconnects the inputs in the highest \
slots until the new arity fits.\n\
7. Constant text is parsed as JSON every time the rule is rebuilt. Text that is not valid JSON \
(e.g. `abc`) becomes the string \"abc\". Write `\"abc\"` with quotes for an explicit string.\n\
8. A JSON object with exactly one key is always read as an operator call. `{\"var\": name}` is a \
variable reference. Literal objects with one key cannot be expressed.\n\
9. Connections that would form a cycle are refused.";
