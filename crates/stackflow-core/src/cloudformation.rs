//! CloudFormation export
//!
//! Renders a stack as a CloudFormation template so it can be handed to the
//! provider's own engine instead of the orchestrator. `${x.attr}` references
//! become `Ref`, `Fn::GetAtt` or `Fn::Sub`. Objects are uploads rather than
//! CloudFormation resources; references to them are replaced by the
//! object's own properties.

use crate::error::{Result, StackError};
use crate::model::{ResourceKind, ResourceSpec, StackTemplate};
use crate::reference::{Reference, as_whole_reference, find_references};
use serde_json::{Map, Value, json};

/// Output format for [`render_cloudformation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
}

impl std::str::FromStr for ExportFormat {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            other => Err(StackError::ExportError(format!(
                "unknown export format '{}' (expected json or yaml)",
                other
            ))),
        }
    }
}

/// Render the stack as a CloudFormation document string
pub fn render_cloudformation(template: &StackTemplate, format: ExportFormat) -> Result<String> {
    let doc = to_cloudformation(template)?;
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(&doc)
            .map_err(|e| StackError::ExportError(e.to_string())),
        ExportFormat::Yaml => {
            serde_yaml::to_string(&doc).map_err(|e| StackError::ExportError(e.to_string()))
        }
    }
}

/// Build the CloudFormation document
pub fn to_cloudformation(template: &StackTemplate) -> Result<Value> {
    let graph = template.graph()?;
    let exporter = Exporter { template };

    let mut resources = Map::new();
    let mut outputs = Map::new();

    for spec in graph.creation_order()? {
        let Some(resource_type) = cloudformation_type(spec.kind) else {
            continue;
        };

        let mut resource = Map::new();
        resource.insert("Type".to_string(), json!(resource_type));
        resource.insert("Properties".to_string(), exporter.properties(spec)?);

        let depends_on: Vec<Value> = spec
            .depends_on
            .iter()
            .filter_map(|d| template.get(d))
            .filter(|d| d.kind != ResourceKind::Object)
            .map(|d| json!(logical_id(&d.name)))
            .collect();
        if !depends_on.is_empty() {
            resource.insert("DependsOn".to_string(), Value::Array(depends_on));
        }

        resources.insert(logical_id(&spec.name), Value::Object(resource));

        if spec.kind == ResourceKind::Deployment {
            let api = spec.property_str("rest-api-id").unwrap_or_default();
            let stage = spec.property_str("stage-name").unwrap_or_default();
            let url = format!(
                "https://{}.execute-api.${{AWS::Region}}.amazonaws.com/{}",
                exporter.sub_text(api)?,
                stage
            );
            outputs.insert(
                format!("{}Endpoint", logical_id(&spec.name)),
                json!({ "Value": { "Fn::Sub": url } }),
            );
        }
    }

    let mut doc = Map::new();
    doc.insert("AWSTemplateFormatVersion".to_string(), json!("2010-09-09"));
    doc.insert(
        "Description".to_string(),
        json!(format!("{} (exported by stackflow)", template.name)),
    );
    doc.insert("Resources".to_string(), Value::Object(resources));
    if !outputs.is_empty() {
        doc.insert("Outputs".to_string(), Value::Object(outputs));
    }
    Ok(Value::Object(doc))
}

/// `code-bucket` → `CodeBucket`
pub fn logical_id(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn cloudformation_type(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::Bucket => Some("AWS::S3::Bucket"),
        ResourceKind::Object => None,
        ResourceKind::Role => Some("AWS::IAM::Role"),
        ResourceKind::Function => Some("AWS::Lambda::Function"),
        ResourceKind::RestApi => Some("AWS::ApiGateway::RestApi"),
        ResourceKind::Model => Some("AWS::ApiGateway::Model"),
        ResourceKind::ResourcePath => Some("AWS::ApiGateway::Resource"),
        ResourceKind::Method => Some("AWS::ApiGateway::Method"),
        ResourceKind::Deployment => Some("AWS::ApiGateway::Deployment"),
        ResourceKind::Permission => Some("AWS::Lambda::Permission"),
    }
}

enum Mapping {
    Ref,
    GetAtt(&'static str),
    Property(&'static str),
}

fn attribute_mapping(kind: ResourceKind, attribute: &str) -> Option<Mapping> {
    use ResourceKind::*;
    let mapping = match (kind, attribute) {
        (Bucket | Role | Function, "name") => Mapping::Ref,
        (Bucket | Role | Function, "arn") => Mapping::GetAtt("Arn"),
        (RestApi, "id") => Mapping::Ref,
        (RestApi, "root_resource_id") => Mapping::GetAtt("RootResourceId"),
        (Model, "name") => Mapping::Ref,
        (RestApi, "name") => Mapping::Property("name"),
        (ResourcePath | Deployment, "id") => Mapping::Ref,
        (Object, "bucket") => Mapping::Property("bucket"),
        (Object, "key") => Mapping::Property("key"),
        (Model | ResourcePath | Method | Deployment, "rest_api_id") => {
            Mapping::Property("rest-api-id")
        }
        (ResourcePath, "path") => Mapping::Property("path-part"),
        (Method, "http_method") => Mapping::Property("http-method"),
        (Method, "resource_id") => Mapping::Property("resource-id"),
        (Method, "path") => Mapping::Property("resource-path"),
        (Deployment, "stage") => Mapping::Property("stage-name"),
        (Permission, "statement_id") => Mapping::Property("statement-id"),
        (Permission, "function_name") => Mapping::Property("function-name"),
        _ => return None,
    };
    Some(mapping)
}

struct Exporter<'a> {
    template: &'a StackTemplate,
}

impl Exporter<'_> {
    fn target(&self, r: &Reference) -> Result<&ResourceSpec> {
        self.template.get(&r.resource).ok_or_else(|| {
            StackError::ExportError(format!("reference {} names an unknown resource", r))
        })
    }

    fn unsupported(r: &Reference, kind: ResourceKind) -> StackError {
        StackError::ExportError(format!(
            "{} of a {} has no CloudFormation equivalent",
            r, kind
        ))
    }

    /// Convert any property value
    fn convert(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) => self.convert_str(s),
            Value::Array(items) => items
                .iter()
                .map(|v| self.convert(v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.convert(v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn convert_str(&self, s: &str) -> Result<Value> {
        if let Some(r) = as_whole_reference(s) {
            return self.intrinsic(&r);
        }
        if find_references(s).is_empty() {
            return Ok(json!(s));
        }
        Ok(json!({ "Fn::Sub": self.sub_text(s)? }))
    }

    fn intrinsic(&self, r: &Reference) -> Result<Value> {
        let target = self.target(r)?;
        match attribute_mapping(target.kind, &r.attribute) {
            Some(Mapping::Ref) => Ok(json!({ "Ref": logical_id(&target.name) })),
            Some(Mapping::GetAtt(attr)) => {
                Ok(json!({ "Fn::GetAtt": [logical_id(&target.name), attr] }))
            }
            Some(Mapping::Property(key)) => match target.properties.get(key) {
                Some(v) => self.convert(v),
                None => Err(Self::unsupported(r, target.kind)),
            },
            None => Err(Self::unsupported(r, target.kind)),
        }
    }

    /// Rewrite `${x.attr}` into `Fn::Sub` syntax (`${X}` / `${X.Arn}`),
    /// inlining property-backed attributes
    fn sub_text(&self, s: &str) -> Result<String> {
        let mut out = s.to_string();
        for r in find_references(s) {
            let target = self.target(&r)?;
            let fragment = match attribute_mapping(target.kind, &r.attribute) {
                Some(Mapping::Ref) => format!("${{{}}}", logical_id(&target.name)),
                Some(Mapping::GetAtt(attr)) => {
                    format!("${{{}.{}}}", logical_id(&target.name), attr)
                }
                Some(Mapping::Property(key)) => match target.properties.get(key) {
                    Some(Value::String(inner)) => self.sub_text(inner)?,
                    Some(other) => other.to_string(),
                    None => return Err(Self::unsupported(&r, target.kind)),
                },
                None => return Err(Self::unsupported(&r, target.kind)),
            };
            out = out.replace(&r.to_string(), &fragment);
        }
        Ok(out)
    }

    fn prop(&self, spec: &ResourceSpec, key: &str) -> Result<Option<Value>> {
        spec.properties.get(key).map(|v| self.convert(v)).transpose()
    }

    fn properties(&self, spec: &ResourceSpec) -> Result<Value> {
        let mut props = Map::new();
        let mut set = |name: &str, value: Option<Value>| {
            if let Some(v) = value {
                props.insert(name.to_string(), v);
            }
        };

        match spec.kind {
            ResourceKind::Bucket => {
                set("BucketName", self.prop(spec, "bucket-name")?);
                if let Some(Value::Object(tags)) = spec.properties.get("tags") {
                    let tags: Vec<Value> = tags
                        .iter()
                        .map(|(k, v)| json!({ "Key": k, "Value": v }))
                        .collect();
                    set("Tags", Some(Value::Array(tags)));
                }
            }
            ResourceKind::Object => {}
            ResourceKind::Role => {
                set("RoleName", self.prop(spec, "role-name")?);
                let service = spec.property_str("service").unwrap_or("lambda.amazonaws.com");
                set("AssumeRolePolicyDocument", Some(assume_role_policy(service)));
                set(
                    "ManagedPolicyArns",
                    self.prop(spec, "managed-policies")?.map(into_array),
                );
                if let Some(policy) = self.prop(spec, "inline-policy")? {
                    set(
                        "Policies",
                        Some(json!([{
                            "PolicyName": format!("{}-inline", spec.name),
                            "PolicyDocument": policy,
                        }])),
                    );
                }
            }
            ResourceKind::Function => {
                set("FunctionName", self.prop(spec, "function-name")?);
                set("Description", self.prop(spec, "description")?);
                set("Role", self.prop(spec, "role")?);
                set(
                    "Code",
                    Some(json!({
                        "S3Bucket": self.prop(spec, "code-bucket")?,
                        "S3Key": self.prop(spec, "code-key")?,
                    })),
                );
                set("Runtime", self.prop(spec, "runtime")?);
                set("Handler", self.prop(spec, "handler")?);
                set("Architectures", self.prop(spec, "architecture")?.map(into_array));
                set("MemorySize", self.prop(spec, "memory-size")?);
                set("Timeout", self.prop(spec, "timeout")?);
            }
            ResourceKind::RestApi => {
                set("Name", self.prop(spec, "name")?);
                set("Description", self.prop(spec, "description")?);
                if let Some(types) = self.prop(spec, "endpoint-type")? {
                    set(
                        "EndpointConfiguration",
                        Some(json!({ "Types": into_array(types) })),
                    );
                }
            }
            ResourceKind::Model => {
                set("RestApiId", self.prop(spec, "rest-api-id")?);
                set("Name", self.prop(spec, "name")?);
                set("ContentType", self.prop(spec, "content-type")?);
                set("Schema", self.prop(spec, "schema")?);
            }
            ResourceKind::ResourcePath => {
                set("RestApiId", self.prop(spec, "rest-api-id")?);
                set("ParentId", self.prop(spec, "parent-id")?);
                set("PathPart", self.prop(spec, "path-part")?);
            }
            ResourceKind::Method => {
                set("RestApiId", self.prop(spec, "rest-api-id")?);
                set("ResourceId", self.prop(spec, "resource-id")?);
                set("HttpMethod", self.prop(spec, "http-method")?);
                set(
                    "AuthorizationType",
                    Some(
                        self.prop(spec, "authorization-type")?
                            .unwrap_or_else(|| json!("NONE")),
                    ),
                );
                if let Some(params) = spec.properties.get("query-parameters") {
                    let mut request = Map::new();
                    for name in into_array(params.clone()).as_array().into_iter().flatten() {
                        if let Some(name) = name.as_str() {
                            request.insert(
                                format!("method.request.querystring.{}", name),
                                json!(false),
                            );
                        }
                    }
                    set("RequestParameters", Some(Value::Object(request)));
                }
                if let Some(Value::String(function_arn)) = spec.properties.get("function-arn") {
                    let uri = format!(
                        "arn:aws:apigateway:${{AWS::Region}}:lambda:path/2015-03-31/functions/{}/invocations",
                        self.sub_text(function_arn)?
                    );
                    set(
                        "Integration",
                        Some(json!({
                            "Type": "AWS_PROXY",
                            "IntegrationHttpMethod": "POST",
                            "Uri": { "Fn::Sub": uri },
                        })),
                    );
                }
                if let Some(model) = self.prop(spec, "response-model")? {
                    set(
                        "MethodResponses",
                        Some(json!([{
                            "StatusCode": "200",
                            "ResponseModels": { "application/json": model },
                        }])),
                    );
                }
            }
            ResourceKind::Deployment => {
                set("RestApiId", self.prop(spec, "rest-api-id")?);
                set("StageName", self.prop(spec, "stage-name")?);
                set("Description", self.prop(spec, "description")?);
            }
            ResourceKind::Permission => {
                set("FunctionName", self.prop(spec, "function-name")?);
                set("Action", Some(json!("lambda:InvokeFunction")));
                set(
                    "Principal",
                    Some(
                        self.prop(spec, "principal")?
                            .unwrap_or_else(|| json!("apigateway.amazonaws.com")),
                    ),
                );
                if let Some(Value::String(api)) = spec.properties.get("rest-api-id") {
                    let source_path = spec.property_str("source-path").unwrap_or("/*");
                    let arn = format!(
                        "arn:aws:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:{}{}",
                        self.sub_text(api)?,
                        source_path
                    );
                    set("SourceArn", Some(json!({ "Fn::Sub": arn })));
                }
            }
        }

        Ok(Value::Object(props))
    }
}

fn into_array(value: Value) -> Value {
    match value {
        Value::Array(_) => value,
        other => Value::Array(vec![other]),
    }
}

/// Trust policy letting `service` assume the role
pub fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole"
        }]
    })
}
