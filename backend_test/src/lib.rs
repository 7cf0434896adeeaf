use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one, inject a client,
/// and ensure that the test's data file is removed regardless of how the
/// test terminates.
///
/// The only injectable dependency is [`rocket::local::asynchronous::Client`].
/// Pass `member` or `admin` to have the client signed in as the example
/// member, with or without the admin code.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Sign the client in if needed.
    let login_request = match parse_macro_input!(args as Option<Ident>) {
        None => None,
        Some(arg) if arg == "member" => Some(quote! {
            crate::model::api::auth::AuthRequest::example()
        }),
        Some(arg) if arg == "admin" => Some(quote! {
            crate::model::api::auth::AuthRequest::example_admin()
        }),
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `member` or `admin`")
                .into_compile_error()
                .into();
        }
    };
    let maybe_login = login_request
        .map(|request| {
            quote! {
                {
                let response = rocket_client
                    .post(uri!(crate::api::auth::authenticate))
                    .header(rocket::http::ContentType::JSON)
                    .body(rocket::serde::json::json!(#request).to_string())
                    .dispatch()
                    .await;
                assert_eq!(rocket::http::Status::Ok, response.status(), "test sign-in failed");
                }
            }
        })
        .unwrap_or_default();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup(data_file: &std::path::Path) -> rocket::local::asynchronous::Client {
                log4rs_test_utils::test_logging::init_logging_once_for(["ratify_backend"], None, None);
                let rocket = crate::rocket_with_figment(crate::test_figment(data_file));
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                #maybe_login

                rocket_client
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            fn cleanup(data_file: &std::path::Path) {
                let _ = std::fs::remove_file(data_file);
                let _ = std::fs::remove_file(data_file.with_extension("json.tmp"));
            }

            // Each test gets its own data file.
            let random: u64 = rand::random();
            let data_file = std::env::temp_dir().join(format!("ratify-test-{random:016x}.json"));

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup and the test, catching any panics.
            // Use a mutex to safely transfer `!UnwindSafe` data.
            let runtime_mutex = std::sync::Mutex::new(runtime);
            let result = std::panic::catch_unwind(|| {
                let runtime = runtime_mutex.into_inner().unwrap();
                runtime.block_on(async {
                    let rocket_client = setup(&data_file).await;
                    #new_name(#(#test_args),*).await;
                });
            });

            // Run the cleanup.
            cleanup(&data_file);

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, and reject anything but a single client parameter.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    let is_client = type_path
                        .path
                        .segments
                        .last()
                        .map_or(false, |segment| segment.ident == "Client");
                    if is_client {
                        if !args.is_empty() {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        args.push(quote! { rocket_client });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected `client_ident: Client`",
        ));
    }

    Ok(args)
}
