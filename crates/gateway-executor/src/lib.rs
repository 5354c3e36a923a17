//! The AI Executor (spec §4.G): the main pipeline for a `generate` call.
//! Wires together the model registry, provider adapters, the virtual-token
//! ledger, the secret store and the remote tool-server manager in the ten
//! numbered steps spec.md lays out.

mod config;
mod error;
mod prompt;
mod types;

pub use config::{ExecutorConfig, ProviderConfig};
pub use error::ExecutorError;
pub use prompt::{interpolate, PromptCatalog};
pub use types::{GenerateMetadata, GenerateRequest, GenerateResponse, PaymentMethod, UsageRecord, UsageSummary, WebSearchPreference};

use gateway_ledger::{cost_cents, platform_fee_cents, PrecheckResult, QuotaPolicy, VirtualTokenLedger};
use gateway_models::ModelRegistry;
use gateway_protocol::Principal;
use gateway_providers::{GenerateOptions, Message, ProviderClient, ToolCall, ToolChoice, ToolDescriptor as AdapterToolDescriptor};
use gateway_secrets::SecretStore;
use gateway_toolservers::RemoteToolServerManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use types::estimate_prompt_tokens;

pub struct AiExecutor {
    config: ExecutorConfig,
    prompts: PromptCatalog,
    providers: HashMap<String, Arc<dyn ProviderClient>>,
    models: Arc<ModelRegistry>,
    ledger: Arc<dyn VirtualTokenLedger>,
    secrets: Arc<dyn SecretStore>,
    tool_servers: Arc<RemoteToolServerManager>,
    request_deadline: Duration,
}

impl AiExecutor {
    pub fn new(
        config: ExecutorConfig,
        prompts: PromptCatalog,
        providers: HashMap<String, Arc<dyn ProviderClient>>,
        models: Arc<ModelRegistry>,
        ledger: Arc<dyn VirtualTokenLedger>,
        secrets: Arc<dyn SecretStore>,
        tool_servers: Arc<RemoteToolServerManager>,
    ) -> Self {
        Self {
            config,
            prompts,
            providers,
            models,
            ledger,
            secrets,
            tool_servers,
            request_deadline: Duration::from_secs(60),
        }
    }

    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    /// The remote tool-server manager this executor dispatches external
    /// tool calls through (spec §4.G step 8); exposed read-only so callers
    /// can inspect server status without reaching into executor internals.
    pub fn tool_servers(&self) -> &Arc<RemoteToolServerManager> {
        &self.tool_servers
    }

    /// Runs the full ten-step pipeline. `cancel` is checked at every
    /// suspension point (upstream call, tool invocation); cancelling it
    /// cancels whatever call is currently in flight (spec §5).
    pub async fn generate(
        &self,
        principal: &Principal,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<GenerateResponse, ExecutorError> {
        let request_id = uuid::Uuid::new_v4().to_string();

        // Step 1: prompt resolution.
        if request.prompt_id.is_some() == request.system_prompt.is_some() {
            return Err(ExecutorError::AmbiguousPrompt);
        }
        let system_prompt = match (&request.prompt_id, &request.system_prompt) {
            (Some(id), None) => self.prompts.resolve(id),
            (None, Some(text)) => text.clone(),
            _ => unreachable!("exactly one branch matches due to the check above"),
        };
        let system_prompt = interpolate(&system_prompt, &request.context);

        // Step 2: provider choice.
        let provider_name = request
            .metadata
            .provider
            .clone()
            .or_else(|| principal.preferred_provider().map(str::to_string))
            .or_else(|| self.config.default_provider.clone())
            .ok_or_else(|| ExecutorError::UnknownProvider(String::new()))?;
        let provider_config = self
            .config
            .provider(&provider_name)
            .ok_or_else(|| ExecutorError::UnknownProvider(provider_name.clone()))?;
        let client = self
            .providers
            .get(&provider_name)
            .ok_or_else(|| ExecutorError::UnknownProvider(provider_name.clone()))?
            .clone();

        // Step 3: key resolution.
        let (api_key, payment_method) = self.resolve_key(principal, &provider_name, &request, provider_config).await?;

        // Step 4: model resolution (restriction + deprecation + normalization).
        let model_alias = request
            .metadata
            .model
            .clone()
            .or_else(|| provider_config.default_model.clone())
            .unwrap_or_else(|| "auto".to_string());
        let model = self.models.resolve(&provider_name, &model_alias)?;

        // Step 5: quota pre-check (credits payment method only — BYOK
        // spends the caller's own upstream budget, not the platform's).
        let prompt_tokens_estimate = estimate_prompt_tokens(&system_prompt) + estimate_prompt_tokens(&request.content);
        if payment_method == PaymentMethod::Credits {
            if let Some(user_id) = principal.user_id() {
                let policy = QuotaPolicy {
                    monthly_cap_tokens: self.config.monthly_cap_tokens,
                };
                match self.ledger.precheck(user_id, prompt_tokens_estimate as i64, policy).await? {
                    PrecheckResult::Allow { .. } => {}
                    PrecheckResult::Deny { reason } => return Err(ExecutorError::QuotaExceeded(reason)),
                }
            }
        }

        // Step 6: tool preparation.
        let mut messages = vec![Message::system(&system_prompt), Message::user(&request.content)];
        let mut opts = GenerateOptions {
            max_tokens: request.metadata.max_tokens,
            temperature: request.metadata.temperature,
            ..Default::default()
        };
        let mut tool_name_to_server: HashMap<String, String> = HashMap::new();
        let external_tools_engaged = request.metadata.use_web_search
            && request.metadata.web_search_preference == WebSearchPreference::External;

        if request.metadata.use_web_search {
            match request.metadata.web_search_preference {
                WebSearchPreference::Native if model.supports_native_tools => {
                    opts.native_tool = Some(serde_json::json!({
                        "type": "web_search_20250305",
                        "name": "web_search",
                    }));
                }
                WebSearchPreference::External => {
                    let available = self.tool_servers.list_tools().await;
                    let mut descriptors = Vec::new();
                    for (server, tool) in available {
                        tool_name_to_server.insert(tool.name.clone(), server);
                        descriptors.push(AdapterToolDescriptor {
                            name: tool.name,
                            description: tool.description,
                            input_schema: tool.input_schema,
                        });
                    }
                    if !descriptors.is_empty() {
                        let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
                        messages[0] = Message::system(format!(
                            "{system_prompt}\n\nAvailable tools: {}.",
                            names.join(", ")
                        ));
                        opts.tools = descriptors;
                    }
                }
                _ => {}
            }
        }

        // Step 7: upstream call.
        let mut result = self.call_with_deadline(&client, &api_key, &model, &messages, &opts, &cancel).await?;
        let mut total_prompt = result.usage.prompt;
        let mut total_completion = result.usage.completion;

        // Step 8: tool loop (external tools only).
        if external_tools_engaged {
            let max_iterations = request.metadata.max_web_searches + 1;
            let mut iteration = 0;
            while !result.tool_calls.is_empty() && iteration < max_iterations {
                iteration += 1;
                for call in &result.tool_calls {
                    let tool_result = self.invoke_tool(call, &tool_name_to_server, &cancel).await;
                    messages.push(Message::assistant(format!(
                        "(calling tool '{}' with {})",
                        call.name, call.arguments
                    )));
                    messages.push(Message::tool_result(call.id.clone(), tool_result));
                }
                opts.tool_choice = Some(ToolChoice::None);
                result = self.call_with_deadline(&client, &api_key, &model, &messages, &opts, &cancel).await?;
                total_prompt += result.usage.prompt;
                total_completion += result.usage.completion;
            }
        }
        let total_tokens = total_prompt + total_completion;

        // Step 9: usage accounting.
        let cost = model.pricing.as_ref().map(|p| cost_cents(total_prompt, total_completion, p.input_per_token, p.output_per_token));
        let platform_fee = cost.map(|c| platform_fee_cents(c, self.config.platform_fee_percent));

        if payment_method == PaymentMethod::Credits {
            if let Some(user_id) = principal.user_id() {
                self.ledger.debit(user_id, total_tokens as i64, &request_id).await?;
            }
        }

        let record = UsageRecord {
            request_id: request_id.clone(),
            user_id: principal.user_id().map(str::to_string),
            provider: provider_name.clone(),
            model: model.id.clone(),
            prompt_tokens: total_prompt,
            completion_tokens: total_completion,
            total_tokens,
            cost_cents: cost,
            platform_fee_cents: platform_fee,
            payment_method,
            timestamp: chrono::Utc::now(),
        };
        tracing::info!(usage = %serde_json::to_value(&record).unwrap_or_default(), "generation usage recorded");

        // Step 10: response.
        Ok(GenerateResponse {
            content: result.text,
            usage: UsageSummary {
                prompt_tokens: total_prompt,
                completion_tokens: total_completion,
                total_tokens,
            },
            model: model.id,
            provider: provider_name,
            request_id,
            finish_reason: format!("{:?}", result.finish_reason).to_lowercase(),
        })
    }

    async fn resolve_key(
        &self,
        principal: &Principal,
        provider_name: &str,
        request: &GenerateRequest,
        provider_config: &ProviderConfig,
    ) -> Result<(String, PaymentMethod), ExecutorError> {
        if let Some(key) = &request.api_key {
            return Ok((key.clone(), PaymentMethod::Byok));
        }
        if let Some(user_id) = principal.user_id() {
            if let Ok(key) = self.secrets.get(user_id, provider_name).await {
                return Ok((key, PaymentMethod::Byok));
            }
        }
        if let Some(key) = &provider_config.server_api_key {
            return Ok((key.clone(), PaymentMethod::Credits));
        }
        Err(ExecutorError::NoCredentials(provider_name.to_string()))
    }

    async fn call_with_deadline(
        &self,
        client: &Arc<dyn ProviderClient>,
        api_key: &str,
        model: &gateway_models::ModelDescriptor,
        messages: &[Message],
        opts: &GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<gateway_providers::GenerateResult, ExecutorError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutorError::Timeout),
            outcome = tokio::time::timeout(self.request_deadline, client.generate(api_key, model, messages, opts)) => {
                match outcome {
                    Ok(Ok(result)) => Ok(result),
                    Ok(Err(adapter_err)) => Err(ExecutorError::Adapter(adapter_err)),
                    Err(_elapsed) => Err(ExecutorError::Timeout),
                }
            }
        }
    }

    async fn invoke_tool(
        &self,
        call: &ToolCall,
        tool_name_to_server: &HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> String {
        let Some(server) = tool_name_to_server.get(&call.name) else {
            return serde_json::json!({"error": format!("unknown tool '{}'", call.name)}).to_string();
        };

        let invocation = self.tool_servers.invoke(server, &call.name, call.arguments.clone());
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(gateway_toolservers::ToolServerError::ProcessExited),
            result = invocation => result,
        };

        // Tool-call failures are not fatal to the request (spec §7): the
        // failure is materialized as the tool-result content so the model
        // can recover on the next turn.
        match outcome {
            Ok(value) => value.to_string(),
            Err(err) => serde_json::json!({"error": err.to_string()}).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_ledger::InMemoryLedger;
    use gateway_models::ModelRegistry;
    use gateway_providers::{MockClient, MockTurn};
    use gateway_secrets::InMemorySecretStore;

    fn executor_with(
        providers: HashMap<String, Arc<dyn ProviderClient>>,
        config: ExecutorConfig,
    ) -> AiExecutor {
        AiExecutor::new(
            config,
            PromptCatalog::new(HashMap::new()),
            providers,
            Arc::new(ModelRegistry::new(HashMap::new())),
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemorySecretStore::new(gateway_secrets::MasterKey::from_bytes(&[7u8; 32]).unwrap())),
            Arc::new(RemoteToolServerManager::new(false)),
        )
    }

    fn anthropic_config() -> ExecutorConfig {
        let mut providers = HashMap::new();
        providers.insert(
            "anthropic".to_string(),
            ProviderConfig {
                server_api_key: Some("sk-server".to_string()),
                default_model: Some("claude-3-5-sonnet-20241022".to_string()),
            },
        );
        ExecutorConfig {
            providers,
            default_provider: Some("anthropic".to_string()),
            platform_fee_percent: 10.0,
            monthly_cap_tokens: None,
        }
    }

    #[tokio::test]
    async fn simple_generation_uses_server_credentials() {
        let mock = Arc::new(MockClient::new("anthropic", vec![MockTurn::Text("hi there".into())]));
        let mut providers: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
        providers.insert("anthropic".to_string(), mock.clone());
        let executor = executor_with(providers, anthropic_config());

        let response = executor
            .generate(
                &Principal::Anonymous,
                GenerateRequest {
                    content: "hi".into(),
                    prompt_id: Some("default".into()),
                    ..Default::default()
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.content, "hi there");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn rejects_request_carrying_both_prompt_id_and_system_prompt() {
        let mock = Arc::new(MockClient::new("anthropic", vec![]));
        let mut providers: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
        providers.insert("anthropic".to_string(), mock);
        let executor = executor_with(providers, anthropic_config());

        let err = executor
            .generate(
                &Principal::Anonymous,
                GenerateRequest {
                    content: "hi".into(),
                    prompt_id: Some("default".into()),
                    system_prompt: Some("also set".into()),
                    ..Default::default()
                },
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::AmbiguousPrompt));
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let executor = executor_with(HashMap::new(), ExecutorConfig::default());
        let err = executor
            .generate(
                &Principal::Anonymous,
                GenerateRequest {
                    content: "hi".into(),
                    system_prompt: Some("be nice".into()),
                    metadata: GenerateMetadata {
                        provider: Some("does-not-exist".into()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn missing_credentials_surface_as_no_credentials() {
        let mock = Arc::new(MockClient::new("anthropic", vec![]));
        let mut providers: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
        providers.insert("anthropic".to_string(), mock);
        let mut config = anthropic_config();
        config.providers.get_mut("anthropic").unwrap().server_api_key = None;
        let executor = executor_with(providers, config);

        let err = executor
            .generate(
                &Principal::Anonymous,
                GenerateRequest {
                    content: "hi".into(),
                    system_prompt: Some("be nice".into()),
                    ..Default::default()
                },
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::NoCredentials(_)));
    }

    #[tokio::test]
    async fn byok_key_bypasses_the_ledger() {
        let mock = Arc::new(MockClient::new("anthropic", vec![MockTurn::Text("ok".into())]));
        let mut providers: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
        providers.insert("anthropic".to_string(), mock);
        let executor = executor_with(providers, anthropic_config());

        let principal = Principal::OAuth {
            user_id: "u1".to_string(),
            email: None,
            scopes: Default::default(),
            preferred_provider: None,
        };
        let response = executor
            .generate(
                &principal,
                GenerateRequest {
                    content: "hi".into(),
                    system_prompt: Some("be nice".into()),
                    api_key: Some("sk-byok".into()),
                    ..Default::default()
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.content, "ok");
    }

    #[tokio::test]
    async fn restricted_model_is_rejected_before_any_upstream_call() {
        let mock = Arc::new(MockClient::new("anthropic", vec![MockTurn::Text("should not run".into())]));
        let mut providers: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
        providers.insert("anthropic".to_string(), mock.clone());
        let executor = executor_with(providers, anthropic_config());
        executor.models.set_restrictions({
            let mut m = HashMap::new();
            m.insert(
                "anthropic".to_string(),
                gateway_models::ModelRestrictions {
                    allowed_models: vec![],
                    allowed_patterns: vec!["claude-3-5-*".to_string()],
                    blocked_models: vec![],
                },
            );
            m
        });

        let err = executor
            .generate(
                &Principal::Anonymous,
                GenerateRequest {
                    content: "hi".into(),
                    system_prompt: Some("be nice".into()),
                    metadata: GenerateMetadata {
                        model: Some("claude-2.1".into()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Model(gateway_models::ModelError::Restriction(_))));
        assert_eq!(mock.call_count(), 0);
    }
}
